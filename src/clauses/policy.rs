//! Clause Policy Table
//!
//! Fixed planning and generation guidance per clause tag. Guidance is always
//! assembled in `ClauseTag::ALL` order, never in the caller's set order.

use super::ClauseTag;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClauseGuidance {
    pub planning: String,
    pub generation: String,
}

struct GuidanceBlock {
    planning: &'static str,
    generation: &'static str,
}

static AGGREGATION: GuidanceBlock = GuidanceBlock {
    planning: r#"
GROUP BY detected:
- All non-aggregated SELECT columns must be in GROUP BY.
- GROUP BY should appear after WHERE but before HAVING/ORDER BY.

If HAVING is present:
- Use HAVING to filter on aggregates, not WHERE.
"#,
    generation: r#"
Ensure:
- All non-aggregated SELECT columns are in GROUP BY.
- HAVING filters only aggregated expressions.
- HAVING appears after GROUP BY.
- Use WHERE for pre-aggregation filters only.
"#,
};

static ORDERING: GuidanceBlock = GuidanceBlock {
    planning: r#"
ORDER BY detected:
- Specify column(s) to sort on with direction (ASC/DESC).
- ORDER BY should be planned after WHERE / GROUP BY / HAVING steps.
- If LIMIT or OFFSET is present, ORDER BY must come before them.
"#,
    generation: r#"
Ensure:
- ORDER BY references valid columns (or aliases defined in SELECT/grouping).
- ORDER BY is placed after GROUP BY or HAVING if those exist.
- If LIMIT is used, ORDER BY must guarantee deterministic results.
"#,
};

static LIMITING: GuidanceBlock = GuidanceBlock {
    planning: r#"
LIMIT detected:
- Decide which rows are returned: use ORDER BY to define which subset is used.
- Plan ORDER BY step before LIMIT to ensure consistent results.
"#,
    generation: r#"
Ensure:
- Use ORDER BY before LIMIT for deterministic row selection.
- LIMIT appears as the final clause after ORDER BY.
"#,
};

static JOINING: GuidanceBlock = GuidanceBlock {
    planning: r#"
JOIN detected:
- Plan all necessary JOINs between tables, listing each table and ON condition.
- Each JOIN must reference valid foreign key paths from schema.
- Avoid Cartesian products: every JOIN must include a precise ON clause.
"#,
    generation: r#"
Ensure:
- Include all tables referenced in the plan via JOINs.
- Each JOIN uses correct foreign key column(s) in ON clause.
- Do not introduce unintended full joins or missing JOIN conditions.
"#,
};

static UNION: GuidanceBlock = GuidanceBlock {
    planning: r#"
UNION detected:
- Both subqueries must select the same number of columns with compatible types.
- Specify UNION vs UNION ALL depending on whether duplicates should be removed.
- Plan ORDER BY / LIMIT after the entire UNION block.
"#,
    generation: r#"
Ensure:
- Each UNION branch has identical column count and data types.
- Use DISTINCT (default UNION) or ALL explicitly.
- If ORDER BY or LIMIT is applied, apply it only at the end of the UNION output.
"#,
};

static INTERSECT: GuidanceBlock = GuidanceBlock {
    planning: r#"
INTERSECT detected:
- Both queries must select the same number and type of columns.
- Plan for duplicates: INTERSECT removes duplicates unless INTERSECT ALL is specified.
- ORDER BY / LIMIT clauses apply after the intersect.
"#,
    generation: r#"
Ensure:
- Each INTERSECT branch selects same number and types of columns.
- Use INTERSECT or INTERSECT ALL as needed.
- Place ORDER BY and LIMIT after the intersect expression.
"#,
};

static EXCEPT: GuidanceBlock = GuidanceBlock {
    planning: r#"
EXCEPT detected:
- Both queries must select the same number and type of columns.
- Plan which side to apply EXCEPT (left - right rows).
- ORDER BY / LIMIT should be planned after the EXCEPT block.
"#,
    generation: r#"
Ensure:
- EXCEPT branches share identical column count/types.
- Use EXCEPT or EXCEPT ALL appropriately.
- Apply ORDER BY and LIMIT only to the final output of the EXCEPT.
"#,
};

fn block_for(tag: ClauseTag) -> Option<&'static GuidanceBlock> {
    match tag {
        ClauseTag::GroupBy | ClauseTag::Having => Some(&AGGREGATION),
        ClauseTag::OrderBy => Some(&ORDERING),
        ClauseTag::Limit => Some(&LIMITING),
        ClauseTag::Join => Some(&JOINING),
        ClauseTag::Union => Some(&UNION),
        ClauseTag::Intersect => Some(&INTERSECT),
        ClauseTag::Except => Some(&EXCEPT),
        ClauseTag::Select
        | ClauseTag::From
        | ClauseTag::Where
        | ClauseTag::Distinct
        | ClauseTag::Subquery => None,
    }
}

/// Concatenate the guidance for every tag present in `clauses`.
pub fn policy_for(clauses: &HashSet<ClauseTag>) -> ClauseGuidance {
    let mut guidance = ClauseGuidance::default();

    for tag in ClauseTag::ALL {
        if !clauses.contains(&tag) {
            continue;
        }
        // GROUP BY and HAVING share a block
        if tag == ClauseTag::Having && clauses.contains(&ClauseTag::GroupBy) {
            continue;
        }
        if let Some(block) = block_for(tag) {
            guidance.planning.push_str(block.planning);
            guidance.generation.push_str(block.generation);
        }
    }

    guidance
}
