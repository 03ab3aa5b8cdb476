//! Condition classification across the predicate vocabulary.

use serde_json::json;
use teralens_core::{extract, Condition, ExtractRequest, Report};

fn run(sql: &str) -> Report {
    extract(&ExtractRequest::new(sql)).expect("extraction should succeed")
}

fn conditions<'a>(report: &'a Report, table: &str, column: &str) -> &'a [Condition] {
    report
        .values
        .get(table)
        .and_then(|columns| columns.get(column))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[test]
fn test_range_conditions() {
    let report =
        run("SELECT b.amount FROM sales.order_items b WHERE b.amount > 100 AND b.amount <= 200");
    let conds = conditions(&report, "sales.order_items", "amount");
    assert!(conds.iter().any(|c| c.op == ">" && c.value == Some(json!(100))));
    assert!(conds.iter().any(|c| c.op == "<=" && c.value == Some(json!(200))));
}

#[test]
fn test_float_and_string_literals() {
    let report = run(
        "SELECT b.x FROM sales.order_items b WHERE b.ratio >= 0.25 AND b.kind = 'credit'",
    );
    assert_eq!(
        conditions(&report, "sales.order_items", "ratio")[0].value,
        Some(json!(0.25))
    );
    assert_eq!(
        conditions(&report, "sales.order_items", "kind")[0].value,
        Some(json!("credit"))
    );
}

#[test]
fn test_between_with_date_literals() {
    let report = run(
        "SELECT b.transaction_date FROM sales.order_items b \
         WHERE b.transaction_date BETWEEN DATE '2024-01-01' AND DATE '2024-12-31'",
    );
    let conds = conditions(&report, "sales.order_items", "transaction_date");
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].op, "between");
    assert_eq!(conds[0].low, Some(json!("DATE '2024-01-01'")));
    assert_eq!(conds[0].high, Some(json!("DATE '2024-12-31'")));
}

#[test]
fn test_between_with_plain_strings() {
    let report = run(
        "SELECT b.transaction_date FROM sales.order_items b \
         WHERE b.transaction_date BETWEEN '2024-01-01' AND '2024-12-31'",
    );
    let conds = conditions(&report, "sales.order_items", "transaction_date");
    assert_eq!(conds[0].low, Some(json!("2024-01-01")));
    assert_eq!(conds[0].high, Some(json!("2024-12-31")));
}

#[test]
fn test_between_with_complex_bounds_keeps_rendered_sql() {
    let report = run(
        "SELECT b.d FROM sales.order_items b \
         WHERE b.d BETWEEN CURRENT_DATE - 30 AND CURRENT_DATE",
    );
    let conds = conditions(&report, "sales.order_items", "d");
    assert_eq!(conds.len(), 1);
    let low = conds[0].low.as_ref().unwrap().as_str().unwrap();
    assert!(low.contains("CURRENT_DATE"));
    assert_eq!(conds[0].high, Some(json!("CURRENT_DATE")));
}

#[test]
fn test_function_on_column_side() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE UPPER(b.status) = 'SHIPPED'");
    let conds = conditions(&report, "sales.order_items", "status");
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].op, "=");
    assert_eq!(conds[0].value, Some(json!("SHIPPED")));
    assert_eq!(conds[0].fn_name, Some("upper".to_string()));
    let stack = conds[0].fn_stack.as_ref().unwrap();
    assert_eq!(stack[0].name, "UPPER");
}

#[test]
fn test_function_on_value_side() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE UPPER('shipped') = b.status");
    let conds = conditions(&report, "sales.order_items", "status");
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].op, "=");
    assert_eq!(conds[0].value, Some(json!("shipped")));
    assert_eq!(conds[0].value_fn, Some("upper".to_string()));
    assert_eq!(conds[0].value_fn_stack.as_ref().unwrap()[0].name, "UPPER");
}

#[test]
fn test_nested_function_stack_order_is_outermost_first() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE UPPER(TRIM(b.status)) = 'X'");
    let conds = conditions(&report, "sales.order_items", "status");
    assert_eq!(conds[0].fn_name, Some("upper".to_string()));
    let names: Vec<&str> = conds[0]
        .fn_stack
        .as_ref()
        .unwrap()
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(names, ["UPPER", "TRIM"]);
}

#[test]
fn test_substr_arguments_recorded() {
    let report = run("SELECT * FROM sales.order_items b WHERE SUBSTR(b.code, 1, 3) = 'ABC'");
    let conds = conditions(&report, "sales.order_items", "code");
    assert_eq!(conds[0].fn_name, Some("substr".to_string()));
    assert_eq!(conds[0].fn_args, Some(vec![json!(1), json!(3)]));
}

#[test]
fn test_oreplace_arguments_recorded() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE OREPLACE(b.code, '-', '') = 'ABC'");
    let conds = conditions(&report, "sales.order_items", "code");
    assert_eq!(conds[0].fn_name, Some("oreplace".to_string()));
    assert_eq!(conds[0].fn_args, Some(vec![json!("-"), json!("")]));
}

#[test]
fn test_extract_records_unit_as_argument() {
    let report = run("SELECT * FROM sales.order_items b WHERE EXTRACT(YEAR FROM b.ts) = 2024");
    let conds = conditions(&report, "sales.order_items", "ts");
    assert_eq!(conds[0].op, "=");
    assert_eq!(conds[0].value, Some(json!(2024)));
    assert_eq!(conds[0].fn_name, Some("extract".to_string()));
    assert_eq!(conds[0].fn_args, Some(vec![json!("YEAR")]));
}

#[test]
fn test_not_like_with_value_function() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE b.status NOT LIKE TRIM('%bad%')");
    let conds = conditions(&report, "sales.order_items", "status");
    assert_eq!(conds[0].op, "not like");
    assert_eq!(conds[0].value, Some(json!("%bad%")));
    assert_eq!(conds[0].value_fn, Some("trim".to_string()));
}

#[test]
fn test_not_in_with_per_element_functions() {
    let report =
        run("SELECT * FROM sales.order_items b WHERE b.status NOT IN (LOWER('x'), 'y')");
    let conds = conditions(&report, "sales.order_items", "status");
    assert_eq!(conds[0].op, "not in");
    assert_eq!(conds[0].values, Some(vec![json!("x"), json!("y")]));
    assert_eq!(
        conds[0].value_fns,
        Some(vec![Some("LOWER".to_string()), None])
    );
    let stacks = conds[0].value_fn_stack_list.as_ref().unwrap();
    assert_eq!(stacks[0][0].name, "LOWER");
    assert!(stacks[1].is_empty());
}

#[test]
fn test_keyword_function_value_emits_no_condition() {
    // CURRENT_DATE carries no literal; only the pseudocode shows it.
    let report = run("SELECT b.x FROM sales.order_items b WHERE b.ship_date = CURRENT_DATE");
    assert!(conditions(&report, "sales.order_items", "ship_date").is_empty());
}

#[test]
fn test_in_over_subquery_emits_no_condition() {
    let report = run(
        "SELECT b.x FROM sales.order_items b \
         WHERE b.order_id IN (SELECT order_id FROM sales.orders)",
    );
    assert!(conditions(&report, "sales.order_items", "order_id").is_empty());
}

#[test]
fn test_not_between_is_not_classified() {
    let report = run(
        "SELECT b.amount FROM sales.order_items b WHERE b.amount NOT BETWEEN 1 AND 10",
    );
    assert!(conditions(&report, "sales.order_items", "amount").is_empty());
}

#[test]
fn test_predicates_inside_case_arms_are_classified() {
    let report = run(
        "SELECT CASE WHEN b.kind = 'credit' THEN 1 ELSE 0 END AS flag \
         FROM sales.order_items b WHERE b.amount > 5",
    );
    assert_eq!(
        conditions(&report, "sales.order_items", "kind")[0].value,
        Some(json!("credit"))
    );
    assert_eq!(
        conditions(&report, "sales.order_items", "amount")[0].op,
        ">"
    );
}

#[test]
fn test_having_aggregate_classified_with_function_stack() {
    let report = run(
        "SELECT b.region, SUM(b.amount) FROM sales.order_items b \
         GROUP BY b.region HAVING SUM(b.amount) > 1000",
    );
    let conds = conditions(&report, "sales.order_items", "amount");
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].op, ">");
    assert_eq!(conds[0].value, Some(json!(1000)));
    assert_eq!(conds[0].fn_name, Some("sum".to_string()));
}

#[test]
fn test_unqualified_column_with_single_table_gets_condition() {
    let report = run("SELECT order_id FROM sales.orders WHERE status = 'OPEN'");
    let conds = conditions(&report, "sales.orders", "status");
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].value, Some(json!("OPEN")));
}

#[test]
fn test_conditions_sorted_deterministically() {
    let report = run(
        "SELECT b.x FROM sales.order_items b \
         WHERE b.x = 'zz' OR b.x = 'aa' OR b.x = 5",
    );
    let conds = conditions(&report, "sales.order_items", "x");
    assert_eq!(conds.len(), 3);
    let keys: Vec<String> = conds
        .iter()
        .map(|c| serde_json::to_string(c).unwrap())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
