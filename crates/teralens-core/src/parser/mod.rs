use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

/// Parse SQL using the specified dialect tag.
///
/// Statements are separated by `;`. Returns one AST per statement.
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    Parser::parse_sql(sqlparser_dialect.as_ref(), sql)
        .map_err(|err| ParseError::from_parser(err, dialect))
}

/// Parse SQL as Teradata (the default dialect).
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, ParseError> {
    parse_sql_with_dialect(sql, Dialect::Teradata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_select() {
        let sql = "SELECT * FROM sales.orders";
        let result = parse_sql(sql);
        assert!(result.is_ok());
        let statements = result.unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_parse_invalid_sql() {
        let sql = "SELECT * FROM";
        let result = parse_sql(sql);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.dialect, Dialect::Teradata);
    }

    #[test]
    fn test_parse_multiple_statements() {
        let sql = "SELECT * FROM sales.orders; SELECT * FROM sales.order_items;";
        let result = parse_sql(sql);
        assert!(result.is_ok());
        let statements = result.unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_parse_cte() {
        let sql = r#"
            WITH active_orders AS (
                SELECT order_id FROM sales.orders WHERE status = 'OPEN'
            )
            SELECT * FROM active_orders
        "#;
        assert!(parse_sql(sql).is_ok());
    }

    #[test]
    fn test_parse_insert_select() {
        let sql = "INSERT INTO sales.archive SELECT * FROM sales.orders WHERE closed = 1";
        assert!(parse_sql(sql).is_ok());
    }

    #[test]
    fn test_parse_create_table_as() {
        let sql = "CREATE TABLE sales.orders_backup AS SELECT * FROM sales.orders";
        assert!(parse_sql(sql).is_ok());
    }

    #[test]
    fn test_parse_merge() {
        let sql = "MERGE INTO sales.orders o USING sales.order_items i \
                   ON o.order_id = i.order_id \
                   WHEN MATCHED THEN UPDATE SET customer_id = i.customer_id";
        assert!(parse_sql(sql).is_ok());
    }

    #[test]
    fn test_parse_with_generic_dialect() {
        let sql = "SELECT a.x FROM dw.sales.orders a";
        assert!(parse_sql_with_dialect(sql, Dialect::Generic).is_ok());
    }
}
