// ═══════════════════════════════════════════════════════════════════
// Wire Tests — JSON payload parsing, request bodies, endpoint URLs
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;
use rust_decimal::Decimal;

use portfolio_client_core::backend::http::{HttpBackend, RetryPolicy};
use portfolio_client_core::backend::wire::{
    parse_history, parse_portfolio, server_message, UpdateUserRequest, WireNumber,
};
use portfolio_client_core::errors::ClientError;
use portfolio_client_core::models::mutation::MutationRequest;
use portfolio_client_core::models::query::EffectiveQuery;
use portfolio_client_core::models::settings::Settings;
use portfolio_client_core::models::ticker::Ticker;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn t(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Portfolio payload
// ═══════════════════════════════════════════════════════════════════

mod portfolio_payload {
    use super::*;

    #[test]
    fn canonical_shape() {
        let body = r#"{
            "stocks_owned": {
                "AAPL": {"quantity": 10, "price": 150.25, "price_total": 1502.5},
                "goog": {"quantity": 2, "price": "140.50", "price_total": "281.00"}
            },
            "total_value": 1783.5
        }"#;
        let p = parse_portfolio(body).unwrap();
        assert_eq!(p.len(), 2);
        let aapl = p.holding(&t("AAPL")).unwrap();
        assert_eq!(aapl.quantity, 10);
        assert_eq!(aapl.latest_price, dec("150.25"));
        assert_eq!(aapl.total_value, dec("1502.5"));
        assert!(p.contains(&t("GOOG")));
        assert_eq!(p.total_value(), dec("1783.5"));
        assert_eq!(p.total_value(), p.holdings_total());
    }

    #[test]
    fn older_field_names() {
        let body = r#"{
            "stocks_owned": {
                "MSFT": {"amount_owned": 3, "latest_closing_price": 400}
            },
            "total_value": 1200
        }"#;
        let p = parse_portfolio(body).unwrap();
        let msft = p.holding(&t("MSFT")).unwrap();
        assert_eq!(msft.quantity, 3);
        // price_total missing: derived from quantity and price
        assert_eq!(msft.total_value, dec("1200"));
    }

    #[test]
    fn empty_holdings() {
        let p = parse_portfolio(r#"{"stocks_owned": {}, "total_value": 0}"#).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.total_value(), Decimal::ZERO);
    }

    #[test]
    fn fractional_quantity_is_malformed() {
        let body = r#"{"stocks_owned": {"AAPL": {"quantity": 1.5, "price": 1}}, "total_value": 1.5}"#;
        assert!(matches!(
            parse_portfolio(body),
            Err(ClientError::MalformedPayload(_))
        ));
    }

    #[test]
    fn missing_total_is_malformed() {
        assert!(matches!(
            parse_portfolio(r#"{"stocks_owned": {}}"#),
            Err(ClientError::MalformedPayload(_))
        ));
    }

    #[test]
    fn not_json() {
        assert!(parse_portfolio("<html>").is_err());
    }

    #[test]
    fn error_body_surfaces_server_message() {
        let err = parse_portfolio(r#"{"error": "User not found."}"#).unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 200, .. }));
        assert_eq!(err.user_message(), "User not found.");
        let err = parse_portfolio(r#"{"message": "Database unavailable"}"#).unwrap_err();
        assert_eq!(err.user_message(), "Database unavailable");
    }
}

// ═══════════════════════════════════════════════════════════════════
// History payload
// ═══════════════════════════════════════════════════════════════════

mod history_payload {
    use super::*;

    #[test]
    fn date_price_map() {
        let mut points = parse_history(r#"{"2024-05-01": 150.2, "2024-05-02": "151.00"}"#).unwrap();
        points.sort_by_key(|p| p.date);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date("2024-05-01"));
        assert_eq!(points[0].price, dec("150.2"));
        assert_eq!(points[1].price, dec("151"));
    }

    #[test]
    fn empty_object_is_no_points() {
        assert!(parse_history("{}").unwrap().is_empty());
    }

    #[test]
    fn error_key_is_server_error() {
        let err = parse_history(r#"{"error": "Invalid ticker"}"#).unwrap_err();
        assert_eq!(err.user_message(), "Invalid ticker");
    }

    #[test]
    fn bad_date_is_malformed() {
        assert!(matches!(
            parse_history(r#"{"05/01/2024": 1.0}"#),
            Err(ClientError::MalformedPayload(_))
        ));
    }

    #[test]
    fn bad_price_is_malformed() {
        assert!(matches!(
            parse_history(r#"{"2024-05-01": "n/a"}"#),
            Err(ClientError::MalformedPayload(_))
        ));
        assert!(parse_history(r#"{"2024-05-01": null}"#).is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Numbers, messages, request bodies
// ═══════════════════════════════════════════════════════════════════

mod fragments {
    use super::*;

    #[test]
    fn wire_number_forms() {
        let n: WireNumber = serde_json::from_str("12.5").unwrap();
        assert_eq!(n.to_decimal().unwrap(), dec("12.5"));
        let n: WireNumber = serde_json::from_str("\" 7 \"").unwrap();
        assert_eq!(n.to_quantity().unwrap(), 7);
        let n: WireNumber = serde_json::from_str("-1").unwrap();
        assert!(n.to_quantity().is_err());
    }

    #[test]
    fn server_message_variants() {
        assert_eq!(server_message(r#"{"message": "Nope"}"#).as_deref(), Some("Nope"));
        assert_eq!(server_message(r#"{"error": "Old style"}"#).as_deref(), Some("Old style"));
        assert_eq!(server_message(r#"{"message": "  "}"#), None);
        assert_eq!(server_message("Internal Server Error"), None);
    }

    #[test]
    fn update_body() {
        let request = MutationRequest::add(t("aapl"), 5).unwrap();
        let body = serde_json::to_value(UpdateUserRequest::new("user1", &request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "username": "user1",
                "action": "add",
                "stock": "AAPL",
                "quantity": 5
            })
        );
    }

    #[test]
    fn remove_body_sends_zero() {
        let request = MutationRequest::remove(t("GOOG"));
        let body = serde_json::to_value(UpdateUserRequest::new("user1", &request)).unwrap();
        assert_eq!(body["action"], "remove");
        assert_eq!(body["quantity"], 0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// HttpBackend endpoints and retry policy
// ═══════════════════════════════════════════════════════════════════

mod http_backend {
    use super::*;

    fn backend(base_url: &str) -> HttpBackend {
        let settings = Settings {
            base_url: base_url.into(),
            ..Settings::default()
        };
        HttpBackend::new(&settings).unwrap()
    }

    #[test]
    fn portfolio_url() {
        let b = backend("http://localhost:5000/");
        assert_eq!(
            b.portfolio_url("user1").unwrap().as_str(),
            "http://localhost:5000/api/portfolio?username=user1"
        );
    }

    #[test]
    fn username_is_query_encoded() {
        let b = backend("http://localhost:5000");
        let url = b.portfolio_url("a b&c").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("username".to_string(), "a b&c".to_string())]);
    }

    #[test]
    fn date_range_url() {
        let b = backend("http://localhost:5000");
        let q = EffectiveQuery::DateRange {
            ticker: t("GOOG"),
            start: date("2024-01-01"),
            end: date("2024-02-01"),
        };
        assert_eq!(
            b.history_url(&q).unwrap().as_str(),
            "http://localhost:5000/api/portfolio/GOOG?start_date=2024-01-01&end_date=2024-02-01"
        );
    }

    #[test]
    fn day_count_url() {
        let b = backend("http://localhost:5000");
        let q = EffectiveQuery::Trailing {
            ticker: t("GOOG"),
            days: 7,
        };
        assert_eq!(
            b.history_url(&q).unwrap().as_str(),
            "http://localhost:5000/api/portfolio/GOOG/7"
        );
    }

    #[test]
    fn base_path_preserved() {
        let b = backend("https://example.com/app/");
        assert_eq!(
            b.endpoint(&["login"]).unwrap().as_str(),
            "https://example.com/app/login"
        );
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = Settings {
            base_url: "localhost:5000".into(),
            ..Settings::default()
        };
        assert!(matches!(
            HttpBackend::new(&settings),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 200,
        };
        assert_eq!(policy.delay_for_attempt(0).as_millis(), 200);
        assert_eq!(policy.delay_for_attempt(1).as_millis(), 400);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 800);
        assert_eq!(policy.delay_for_attempt(10).as_millis(), 5_000);
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
