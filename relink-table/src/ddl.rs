//! DDL text synthesis for linked tables.

/// Quote an identifier, doubling embedded double quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quote a string literal, doubling embedded single quotes.
pub(crate) fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// `schema`.`name` with both parts quoted.
pub(crate) fn qualified_local_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

/// Parameters of the CREATE statement, assembled by the table facade.
pub(crate) struct CreateParams<'a> {
    pub schema: &'a str,
    pub name: &'a str,
    pub comment: Option<&'a str>,
    pub driver: &'a str,
    pub url: &'a str,
    pub user: &'a str,
    pub password: &'a str,
    pub original_table: &'a str,
    pub temporary: bool,
    pub global_temporary: bool,
    pub emit_updates: bool,
    pub read_only: bool,
    pub fetch_size: u32,
}

/// Re-create text for the link. FORCE is always present so the statement
/// succeeds even when the remote source is unreachable at replay time.
pub(crate) fn create_sql(p: &CreateParams<'_>) -> String {
    let mut buf = String::from("CREATE FORCE ");
    if p.temporary {
        if p.global_temporary {
            buf.push_str("GLOBAL ");
        } else {
            buf.push_str("LOCAL ");
        }
        buf.push_str("TEMPORARY ");
    }
    buf.push_str("LINKED TABLE ");
    buf.push_str(&qualified_local_name(p.schema, p.name));
    if let Some(comment) = p.comment {
        buf.push_str(" COMMENT ");
        buf.push_str(&quote_string(comment));
    }
    buf.push('(');
    buf.push_str(&quote_string(p.driver));
    buf.push_str(", ");
    buf.push_str(&quote_string(p.url));
    buf.push_str(", ");
    buf.push_str(&quote_string(p.user));
    buf.push_str(", ");
    buf.push_str(&quote_string(p.password));
    buf.push_str(", ");
    buf.push_str(&quote_string(p.original_table));
    buf.push(')');
    if p.emit_updates {
        buf.push_str(" EMIT UPDATES");
    }
    if p.read_only {
        buf.push_str(" READONLY");
    }
    if p.fetch_size != 0 {
        buf.push_str(" FETCH_SIZE ");
        buf.push_str(&p.fetch_size.to_string());
    }
    buf
}

/// Drop text for the link.
pub(crate) fn drop_sql(schema: &str, name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_local_name(schema, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("T"), "\"T\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_string("it's"), "'it''s'");
    }

    #[test]
    fn test_create_sql_minimal() {
        let p = CreateParams {
            schema: "PUBLIC",
            name: "T",
            comment: None,
            driver: "fake",
            url: "fake:mem",
            user: "sa",
            password: "",
            original_table: "USERS",
            temporary: false,
            global_temporary: false,
            emit_updates: false,
            read_only: false,
            fetch_size: 0,
        };
        assert_eq!(
            create_sql(&p),
            "CREATE FORCE LINKED TABLE \"PUBLIC\".\"T\"\
             ('fake', 'fake:mem', 'sa', '', 'USERS')"
        );
    }

    #[test]
    fn test_create_sql_all_modifiers() {
        let p = CreateParams {
            schema: "PUBLIC",
            name: "T",
            comment: Some("remote users"),
            driver: "fake",
            url: "fake:mem",
            user: "sa",
            password: "x",
            original_table: "USERS",
            temporary: true,
            global_temporary: true,
            emit_updates: true,
            read_only: true,
            fetch_size: 50,
        };
        let sql = create_sql(&p);
        assert!(sql.starts_with("CREATE FORCE GLOBAL TEMPORARY LINKED TABLE"));
        assert!(sql.contains(" COMMENT 'remote users'"));
        assert!(sql.ends_with(" EMIT UPDATES READONLY FETCH_SIZE 50"));
    }

    #[test]
    fn test_drop_sql() {
        assert_eq!(
            drop_sql("PUBLIC", "T"),
            "DROP TABLE IF EXISTS \"PUBLIC\".\"T\""
        );
    }
}
