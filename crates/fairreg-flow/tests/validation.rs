use serde_json::{Value, json};

use fairreg_flow::{RegistrationSession, StepData, StepRegistry, validate_step};

fn record(value: Value) -> StepData {
    value.as_object().cloned().expect("object fixture")
}

fn conditional_registry() -> StepRegistry {
    StepRegistry::from_json(
        &json!({
            "id": "conditional",
            "title": "Conditional",
            "version": "1.0",
            "steps": {
                "1": {
                    "title": "Category",
                    "transitions": { "next": "details" },
                    "required": ["category"]
                },
                "details": {
                    "title": "Details",
                    "transitions": "terminal",
                    "required": ["companyName"],
                    "required_if": [
                        {
                            "when": { "field": "category", "in": ["Winemaker"] },
                            "fields": ["annualProductionLiters"]
                        }
                    ]
                }
            }
        })
        .to_string(),
    )
    .expect("registry")
}

#[test]
fn required_if_triggers_across_steps() {
    let registry = conditional_registry();
    let mut session = RegistrationSession::new();
    session.set_step_data("1", record(json!({ "category": "Winemaker" })));
    session.push_path("1");

    let result = validate_step(
        &registry,
        "details",
        &record(json!({ "companyName": "Cantina" })),
        &session,
    )
    .expect("known step");
    assert!(!result.is_valid);
    assert_eq!(result.fields, vec!["annualProductionLiters"]);
    assert_eq!(result.errors, vec!["Annual Production Liters is required"]);

    let result = validate_step(
        &registry,
        "details",
        &record(json!({ "companyName": "Cantina", "annualProductionLiters": "12000" })),
        &session,
    )
    .expect("known step");
    assert!(result.is_valid);
    assert!(result.errors.is_empty());
}

#[test]
fn required_if_stays_inactive_for_other_values() {
    let registry = conditional_registry();
    let mut session = RegistrationSession::new();
    session.set_step_data("1", record(json!({ "category": "Distributor" })));

    let result = validate_step(
        &registry,
        "details",
        &record(json!({ "companyName": "Trade Co" })),
        &session,
    )
    .expect("known step");
    assert!(result.is_valid);
}

#[test]
fn required_if_matches_collection_values() {
    let registry = conditional_registry();
    let mut session = RegistrationSession::new();
    session.set_step_data("1", record(json!({ "category": ["Cooperative", "Winemaker"] })));

    let result = validate_step(
        &registry,
        "details",
        &record(json!({ "companyName": "Co-op" })),
        &session,
    )
    .expect("known step");
    assert_eq!(result.fields, vec!["annualProductionLiters"]);
}

#[test]
fn short_password_reports_each_violation() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "password": "short1",
        "confirmPassword": "short1"
    }));
    let result = validate_step(&registry, "account", &data, &RegistrationSession::new())
        .expect("known step");
    assert!(!result.is_valid);
    assert_eq!(result.fields, vec!["password"]);
    assert!(result.errors.len() >= 2);
    assert!(
        result
            .errors
            .contains(&"Password must be at least 10 characters".to_string())
    );
    assert!(
        result
            .errors
            .contains(&"Password must contain an uppercase letter".to_string())
    );
}

#[test]
fn strong_password_has_no_password_errors() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "password": "LongEnough1",
        "confirmPassword": "LongEnough1"
    }));
    let result = validate_step(&registry, "account", &data, &RegistrationSession::new())
        .expect("known step");
    assert!(result.is_valid, "unexpected errors: {:?}", result.errors);
}

#[test]
fn confirmation_must_match_and_email_must_parse() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({
        "firstName": "Ada",
        "lastName": "  ",
        "email": "ada-at-example",
        "password": "LongEnough1",
        "confirmPassword": "LongEnough2"
    }));
    let result = validate_step(&registry, "account", &data, &RegistrationSession::new())
        .expect("known step");
    assert_eq!(result.fields, vec!["lastName", "email", "confirmPassword"]);
    assert_eq!(
        result.errors,
        vec![
            "Last Name is required",
            "Email must be a valid email address",
            "Passwords do not match",
        ]
    );
}

#[test]
fn numeric_fields_must_parse() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({ "tablesQty": "two", "chairsQty": 8 }));
    let result = validate_step(&registry, "wv-ex-step-10", &data, &RegistrationSession::new())
        .expect("known step");
    assert_eq!(result.fields, vec!["tablesQty"]);
    assert_eq!(result.errors, vec!["Tables Qty must be a number"]);

    let data = record(json!({ "tablesQty": " 2 ", "chairsQty": 8 }));
    let result = validate_step(&registry, "wv-ex-step-10", &data, &RegistrationSession::new())
        .expect("known step");
    assert!(result.is_valid);
}

#[test]
fn collection_fields_need_a_selection() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({ "buyerType": "Importer", "interests": [] }));
    let result = validate_step(&registry, "wv-bu-step-2", &data, &RegistrationSession::new())
        .expect("known step");
    assert_eq!(result.fields, vec!["interests[]"]);
    assert_eq!(result.errors, vec!["Interests requires at least one selection"]);
}

#[test]
fn unticked_checkbox_counts_as_missing() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let data = record(json!({ "acceptTerms": false }));
    let result = validate_step(&registry, "final", &data, &RegistrationSession::new())
        .expect("known step");
    assert_eq!(result.fields, vec!["acceptTerms"]);
}

#[test]
fn unknown_step_is_a_configuration_error() {
    let registry = StepRegistry::trade_fair().expect("registry");
    assert!(
        validate_step(
            &registry,
            "wv-zz-step-1",
            &StepData::new(),
            &RegistrationSession::new()
        )
        .is_err()
    );
}
