use serde_json::{Value, json};

use fairreg_flow::{RegistrationSession, StepData, StepRegistry, resolve_next};

fn record(value: Value) -> StepData {
    value.as_object().cloned().expect("object fixture")
}

fn session_with(records: &[(&str, Value)]) -> RegistrationSession {
    let mut session = RegistrationSession::new();
    for (step, value) in records {
        session.set_step_data(step, record(value.clone()));
        session.push_path(step);
    }
    session
}

fn branching_registry() -> StepRegistry {
    StepRegistry::from_json(
        &json!({
            "id": "branching",
            "title": "Branching",
            "version": "1.0",
            "steps": {
                "1": {
                    "title": "Start",
                    "condition_field": "choice",
                    "transitions": {
                        "rules": [
                            { "when": { "op": "includes", "value": "a" }, "next": "first" },
                            { "when": { "op": "literal", "value": "a" }, "next": "second" },
                            { "when": { "op": "literal", "value": "b" }, "next": "second" }
                        ]
                    }
                },
                "first": { "title": "First", "transitions": { "next": "done" } },
                "second": { "title": "Second", "transitions": { "next": "done" } },
                "done": { "title": "Done", "transitions": "terminal" }
            }
        })
        .to_string(),
    )
    .expect("registry")
}

#[test]
fn exhibitor_wine_reaches_participation_model() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let session = session_with(&[("1", json!({ "profile": "Exhibitor" }))]);
    assert_eq!(
        resolve_next(&registry, "1", &session).as_deref(),
        Some("wv-ex-step-2")
    );

    let session = session_with(&[
        ("1", json!({ "profile": "Exhibitor" })),
        ("wv-ex-step-2", json!({ "fieldOfWork": "Wine" })),
    ]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-2", &session).as_deref(),
        Some("wv-ex-step-3")
    );
}

#[test]
fn head_exhibitor_with_wine_routes_through_prev_predicate() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let wine = session_with(&[
        ("1", json!({ "profile": "Exhibitor" })),
        ("wv-ex-step-2", json!({ "fieldOfWork": "Wine" })),
        ("wv-ex-step-3", json!({ "participationModel": "Head Exhibitor" })),
    ]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-3", &wine).as_deref(),
        Some("wv-ex-step-4")
    );

    let food = session_with(&[
        ("1", json!({ "profile": "Exhibitor" })),
        ("wv-ex-step-2", json!({ "fieldOfWork": "Food" })),
        ("wv-ex-step-3", json!({ "participationModel": "Head Exhibitor" })),
    ]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-3", &food).as_deref(),
        Some("wv-ex-step-5")
    );
}

#[test]
fn earlier_rule_wins_when_two_match() {
    let registry = StepRegistry::trade_fair().expect("registry");
    // Co-Exhibitor matches the literal rule and Wine matches the later prev rule.
    let session = session_with(&[
        ("1", json!({ "profile": "Exhibitor" })),
        ("wv-ex-step-2", json!({ "fieldOfWork": "Wine" })),
        ("wv-ex-step-3", json!({ "participationModel": "Co-Exhibitor" })),
    ]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-3", &session).as_deref(),
        Some("wv-ex-step-6")
    );

    let registry = branching_registry();
    let session = session_with(&[("1", json!({ "choice": "a" }))]);
    assert_eq!(resolve_next(&registry, "1", &session).as_deref(), Some("first"));
    let session = session_with(&[("1", json!({ "choice": "b" }))]);
    assert_eq!(resolve_next(&registry, "1", &session).as_deref(), Some("second"));
}

#[test]
fn no_match_without_default_is_none() {
    let registry = branching_registry();
    let session = session_with(&[("1", json!({ "choice": "zzz" }))]);
    assert_eq!(resolve_next(&registry, "1", &session), None);

    let registry = StepRegistry::trade_fair().expect("registry");
    let session = session_with(&[("1", json!({ "profile": "Speaker" }))]);
    assert_eq!(resolve_next(&registry, "1", &session), None);
    assert_eq!(resolve_next(&registry, "1", &RegistrationSession::new()), None);
}

#[test]
fn default_is_only_taken_after_other_rules() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let session = session_with(&[("wv-vi-step-2", json!({ "visitorType": "Trade" }))]);
    assert_eq!(
        resolve_next(&registry, "wv-vi-step-2", &session).as_deref(),
        Some("account")
    );
    let session = session_with(&[("wv-vi-step-2", json!({ "visitorType": "Press" }))]);
    assert_eq!(
        resolve_next(&registry, "wv-vi-step-2", &session).as_deref(),
        Some("wv-vi-step-3")
    );
}

#[test]
fn includes_matches_collections() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let session = session_with(&[(
        "wv-bu-step-2",
        json!({ "buyerType": "Retailer", "interests": ["Food", "Wine"] }),
    )]);
    assert_eq!(
        resolve_next(&registry, "wv-bu-step-2", &session).as_deref(),
        Some("wv-bu-step-3")
    );
    let session = session_with(&[(
        "wv-bu-step-2",
        json!({ "buyerType": "Retailer", "interests": ["Food"] }),
    )]);
    assert_eq!(
        resolve_next(&registry, "wv-bu-step-2", &session).as_deref(),
        Some("wv-bu-step-4")
    );
}

#[test]
fn checkbox_rules_follow_truthiness() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let on = session_with(&[("wv-ex-step-9", json!({ "needsFurniture": true }))]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-9", &on).as_deref(),
        Some("wv-ex-step-10")
    );
    let off = session_with(&[("wv-ex-step-9", json!({}))]);
    assert_eq!(
        resolve_next(&registry, "wv-ex-step-9", &off).as_deref(),
        Some("account")
    );
}

#[test]
fn single_successor_ignores_condition_data() {
    let registry = StepRegistry::trade_fair().expect("registry");
    let session = RegistrationSession::new();
    assert_eq!(
        resolve_next(&registry, "account", &session).as_deref(),
        Some("final")
    );
    assert_eq!(resolve_next(&registry, "final", &session), None);
    assert_eq!(resolve_next(&registry, "nowhere", &session), None);
}
