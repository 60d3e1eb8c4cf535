//! Agent Prompts - prompt builders for each reasoning stage
//!
//! One builder per stage of the pipeline. Clause guidance from the policy
//! table is spliced into the planning, generation and correction prompts.

use crate::execution_loop::SqlErrorClass;

/// Substituted for the query plan when the planning stage fails.
pub const GENERIC_PLAN: &str = "Generate SQL based on the question";

/// Substituted for the decomposition when the decomposition stage fails.
pub const EMPTY_DECOMPOSITION: &str = "{}";

pub fn schema_linking_prompt(question: &str, table_schema: &str) -> String {
    format!(
        r#"You are a Schema Linking Agent in an NL2SQL framework. Return the relevant schema links for generating SQL query for the question.

Given:
- A natural language question
- Database schemas with columns, primary keys (PK), and foreign keys (FK)

Cross-check your schema for:
- Missing or incorrect FK-PK relationships and add them
- Incomplete column selections (especially join keys)
- Table alias mismatches
- Linkage errors that would lead to incorrect joins or groupBy clauses

Question: {question}

Table Schema:
{table_schema}

Return the schema links in given format:

Table: primary_key_col, foreign_key_col, col1, col2, ... all other columns in Table

ONLY list relevant tables and columns and Foreign Keys in given format and no other extra characters.
"#
    )
}

pub fn decomposition_prompt(question: &str, schema: &str) -> String {
    format!(
        r#"You are a Subproblem Agent in an NL2SQL system. Break down the question into subproblems.

Question: {question}

Schema:
{schema}

Identify SQL clauses needed (SELECT, WHERE, JOIN, GROUP BY, HAVING, ORDER BY, LIMIT, etc.)

Return JSON format:
{{
  "clauses": ["SELECT", "WHERE", "JOIN"],
  "subproblems": [
    {{"clause": "SELECT", "description": "..."}},
    {{"clause": "WHERE", "description": "..."}}
  ]
}}

Return ONLY valid JSON, no extra text.
"#
    )
}

pub fn query_plan_prompt(
    question: &str,
    schema: &str,
    subproblems: &str,
    planning_guidance: &str,
) -> String {
    format!(
        r#"You are a Query Plan Agent. Create a step-by-step natural language plan for SQL generation.

Question: {question}

Schema:
{schema}

Subproblems:
{subproblems}

Create a clear plan with:
1. Which tables to use
2. What columns to select
3. Join conditions
4. Filter conditions
5. Grouping/aggregation if needed
6. Sorting/limiting if needed
{guidance}
Return a concise bullet-pointed plan. Do NOT write SQL code.
"#,
        guidance = guidance_section("Clause-specific planning rules:", planning_guidance),
    )
}

pub fn sql_generation_prompt(
    question: &str,
    plan: &str,
    schema: &str,
    generation_guidance: &str,
) -> String {
    format!(
        r#"You are a SQL Generation Agent. Generate SQL query based on the plan.

Question: {question}

Schema:
{schema}

Plan:
{plan}

Generate a valid SQL query that:
- Follows standard SQL syntax
- Uses correct table and column names from schema
- Implements all steps in the plan
- Is executable on SQLite
{guidance}
Return ONLY the SQL query, no explanations.
"#,
        guidance = guidance_section("Clause-specific rules:", generation_guidance),
    )
}

pub fn correction_plan_prompt(
    question: &str,
    sql: &str,
    schema: &str,
    error: &str,
    error_class: &SqlErrorClass,
) -> String {
    format!(
        r#"You are a SQL Correction Plan Agent. The generated SQL has an error.

Question: {question}

Schema:
{schema}

Current SQL:
{sql}

Error:
{error}

Error category: {error_class}
Hint: {hint}

Analyze the error and create a correction plan. What needs to be fixed?

Return a concise correction plan.
"#,
        hint = error_class.recovery_hint(),
    )
}

pub fn correction_sql_prompt(
    question: &str,
    schema: &str,
    correction_plan: &str,
    old_sql: &str,
    generation_guidance: &str,
) -> String {
    format!(
        r#"You are a SQL Correction Agent. Fix the SQL based on the correction plan.

Question: {question}

Schema:
{schema}

Old SQL (with error):
{old_sql}

Correction Plan:
{correction_plan}
{guidance}
Generate the corrected SQL query. Return ONLY the SQL, no explanations.
"#,
        guidance = guidance_section("Clause-specific rules:", generation_guidance),
    )
}

fn guidance_section(title: &str, guidance: &str) -> String {
    if guidance.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}\n{}\n", title, guidance.trim_end())
    }
}
