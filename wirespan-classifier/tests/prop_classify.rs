use proptest::prelude::*;
use wirespan_classifier::{http, http2, sql};

// ---------------------------------------------------------------------------
// Property: classifiers never panic on arbitrary bytes
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn parse_request_line_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let _ = http::parse_request_line(&data);
    }

    #[test]
    fn host_from_buf_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let _ = http::host_from_buf(&data);
    }

    #[test]
    fn parse_headers_fragment_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let _ = http2::parse_headers_fragment(&data);
    }

    #[test]
    fn sql_offset_never_panics(s in "\\PC*") {
        let _ = sql::sql_statement_offset(&s);
    }

    #[test]
    fn operation_and_table_never_panic(s in "\\PC*") {
        let _ = sql::parse_operation_and_table(&s);
    }
}

// ---------------------------------------------------------------------------
// Property: remove_query is idempotent
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn remove_query_idempotent(url in "\\PC{0,128}") {
        let once = http::remove_query(&url);
        prop_assert_eq!(http::remove_query(once), once);
    }
}

// ---------------------------------------------------------------------------
// Property: the detected statement offset always lands on a SQL verb
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn sql_offset_points_at_verb(
        prefix in proptest::collection::vec(0u8..=8u8, 0..16),
        verb in prop_oneof![
            Just("SELECT"), Just("UPDATE"), Just("DELETE"), Just("INSERT"),
            Just("ALTER"), Just("CREATE"), Just("DROP"),
        ],
        suffix in "[a-z ]{0,32}",
    ) {
        let mut payload = String::new();
        for b in &prefix {
            payload.push(*b as char);
        }
        payload.push_str(verb);
        payload.push(' ');
        payload.push_str(&suffix);

        let off = sql::sql_statement_offset(&payload).expect("verb present");
        const KEYWORDS: [&str; 7] = [
            "SELECT", "UPDATE", "DELETE", "INSERT", "ALTER", "CREATE", "DROP",
        ];
        let upper = payload.to_ascii_uppercase();
        prop_assert!(KEYWORDS.iter().any(|k| upper[off..].starts_with(k)));
    }
}

// ---------------------------------------------------------------------------
// Property: extracted method/path contain no whitespace or NULs
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn method_and_path_have_no_separators(
        data in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let (method, path) = http::parse_request_line(&data);
        prop_assert!(!method.contains(' '));
        prop_assert!(!path.contains(' '));
        prop_assert!(!method.contains('\r') && !method.contains('\n'));
        prop_assert!(!path.contains('\r') && !path.contains('\n'));
        prop_assert!(!method.contains('\0') && !path.contains('\0'));
    }
}
