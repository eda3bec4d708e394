//! Integration tests for whole conversations

use proptest::prelude::*;
use std::sync::Arc;
use zobot_domain::{Bead, EntityId, FactValue};
use zobot_engine::{
    ConvoProtocol, EngineConfig, EngineError, Outcome, ProtocolError, Truth,
};
use zobot_parser::{LexiconParser, MockParser};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn yes_id() -> EntityId {
    EntityId::new(1, 105, "YES")
}

fn no_id() -> EntityId {
    EntityId::new(1, 105, "NO")
}

/// Helper to create the parser used by most scenarios
fn lexicon() -> LexiconParser {
    LexiconParser::new()
        .with_entity("yes", yes_id())
        .with_entity("no", no_id())
        .with_entity("headache", EntityId::new(2, 1, "HEADACHE"))
        .with_entity("rash", EntityId::new(2, 1, "RASH"))
        .with_entity("cough", EntityId::new(2, 1, "COUGH"))
        .with_valued_entity("temperature", EntityId::new(2, 1, "TEMP"))
        .with_fluff(["i", "have", "a", "and", "my", "is", "also"])
}

fn start(doc: &str) -> ConvoProtocol {
    init_tracing();
    ConvoProtocol::from_json(doc, EngineConfig::default(), Arc::new(lexicon())).unwrap()
}

fn fact(convo: &ConvoProtocol, id: &str) -> zobot_engine::FactSnapshot {
    convo
        .snapshot()
        .into_iter()
        .find(|f| f.id == id)
        .unwrap_or_else(|| panic!("no fact {}", id))
}

/// flu = AND(temperature > 100, headache)
const FLU: &str = r#"{
    "facts": [
        {"id": "fever", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "TEMP", "name": "temperature",
                    "value_type": {"name": "number", "lo": 90, "hi": 110},
                    "expression": {"op": ">", "values": 100}}},
        {"id": "headache", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "HEADACHE", "name": "headache"}},
        {"id": "flu", "type": "composite", "operator": "AND",
         "text": "You may have the flu.", "facts": ["fever", "headache"]}
    ],
    "terminals": ["flu"]
}"#;

#[test]
fn test_fever_and_headache_reach_terminal() {
    let mut convo = start(FLU);

    let first = convo.step(None);
    assert!(!first.finished);
    assert_eq!(first.utterance, "What is your temperature?");

    let second = convo.step(Some("101"));
    assert!(!second.finished);
    assert_eq!(second.utterance, "Do you have headache?");
    assert_eq!(fact(&convo, "fever").truth, Truth::True);

    let last = convo.step(Some("yes"));
    assert!(last.finished);
    assert_eq!(last.utterance, "You may have the flu.");
    assert_eq!(convo.outcome(), Some(&Outcome::Terminal("flu".to_string())));
}

#[test]
fn test_unmatched_answer_is_re_asked() {
    let mut convo = start(FLU);
    convo.step(None);

    let step = convo.step(Some("pretty hot"));
    assert!(!step.finished);
    assert_eq!(step.utterance, "Sorry I didn't get that. What is your temperature?");

    let fever = fact(&convo, "fever");
    assert_eq!(fever.truth, Truth::Unresolved);
    assert_eq!(fever.value, None);
    assert!(fever.asked);
}

#[test]
fn test_out_of_range_value_is_named() {
    let mut convo = start(FLU);
    convo.step(None);

    let step = convo.step(Some("300"));
    assert_eq!(step.utterance, "Sorry, 300 is not valid. What is your temperature?");

    // a valid answer afterwards is taken normally
    let next = convo.step(Some("102"));
    assert_eq!(next.utterance, "Do you have headache?");
}

#[test]
fn test_rejection_is_not_repeated_without_input() {
    let mut convo = start(FLU);
    convo.step(None);
    convo.step(Some("300"));

    let repeat = convo.step(None);
    assert!(!repeat.finished);
    assert_eq!(repeat.utterance, "What is your temperature?");
}

#[test]
fn test_resolved_fact_keeps_its_value() {
    let mut convo = start(FLU);
    convo.step(None);
    convo.step(Some("101"));

    // a later mention of the same entity does not overwrite the answer
    let step = convo.step(Some("my temperature is 98"));
    assert!(!step.finished);
    assert_eq!(
        fact(&convo, "fever").value,
        Some(FactValue::Number(101.0))
    );
    assert_eq!(fact(&convo, "fever").truth, Truth::True);
}

#[test]
fn test_volunteered_values_resolve_unasked_facts() {
    let mut convo = start(FLU);
    convo.step(None);

    // answering with a mention of the headache resolves it on the way
    let step = convo.step(Some("101 and I have a headache"));
    assert!(step.finished);
    assert_eq!(step.utterance, "You may have the flu.");
    assert!(!fact(&convo, "headache").asked);
}

#[test]
fn test_false_and_finishes_without_outcome() {
    let mut convo = start(FLU);
    convo.step(None);

    let step = convo.step(Some("98"));
    assert!(step.finished);
    assert_eq!(step.utterance, EngineConfig::default().no_outcome_text);
    assert_eq!(convo.outcome(), Some(&Outcome::NoOutcome));

    // pruning: the dead AND is no longer a parent of its children
    assert!(fact(&convo, "fever").parents.is_empty());
    assert!(fact(&convo, "headache").parents.is_empty());
    assert!(!fact(&convo, "headache").asked);

    // finished conversations repeat themselves and stay untouched
    assert_eq!(convo.step(Some("yes")), step);
    assert_eq!(fact(&convo, "headache").truth, Truth::Unresolved);
}

/// either = OR(cough, rash)
const EITHER: &str = r#"{
    "facts": [
        {"id": "cough", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "COUGH", "name": "a cough"}},
        {"id": "rash", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "RASH", "name": "a rash"}},
        {"id": "either", "type": "composite", "operator": "OR", "text": "See a doctor.", "facts": ["cough", "rash"]}
    ],
    "terminals": ["either"]
}"#;

#[test]
fn test_or_ends_without_asking_second_fact() {
    let mut parser = MockParser::default();
    parser.add_response("yes", vec![Bead::entity(yes_id())]);
    let parser = Arc::new(parser);

    let mut convo =
        ConvoProtocol::from_json(EITHER, EngineConfig::default(), parser.clone()).unwrap();

    assert_eq!(convo.step(None).utterance, "Do you have a cough?");
    let step = convo.step(Some("yes"));
    assert!(step.finished);
    assert_eq!(step.utterance, "See a doctor.");

    assert!(!fact(&convo, "rash").asked);
    assert_eq!(fact(&convo, "rash").truth, Truth::Unresolved);
    assert_eq!(parser.call_count(), 1);
}

#[test]
fn test_or_moves_on_after_no() {
    let mut convo = start(EITHER);
    convo.step(None);

    let step = convo.step(Some("no"));
    assert!(!step.finished);
    assert_eq!(step.utterance, "Do you have a rash?");

    let step = convo.step(Some("no"));
    assert!(step.finished);
    assert_eq!(convo.outcome(), Some(&Outcome::NoOutcome));
}

#[test]
fn test_parser_failure_is_re_asked() {
    let mut parser = MockParser::default();
    parser.add_error("???");
    let mut convo =
        ConvoProtocol::from_json(EITHER, EngineConfig::default(), Arc::new(parser)).unwrap();

    convo.step(None);
    let step = convo.step(Some("???"));
    assert!(!step.finished);
    assert_eq!(step.utterance, "Sorry I didn't get that. Do you have a cough?");
}

/// Two terminals sharing the fever question
const CLINIC: &str = r#"{
    "facts": [
        {"id": "fever", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "FEVER", "name": "a fever"}},
        {"id": "rash", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "RASH", "name": "a rash"}},
        {"id": "cough", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "COUGH", "name": "a cough"}},
        {"id": "measles", "type": "composite", "operator": "AND", "text": "Possibly measles.", "facts": ["fever", "rash"]},
        {"id": "flu", "type": "composite", "operator": "AND", "text": "Possibly flu.", "facts": ["fever", "cough"]}
    ],
    "terminals": ["measles", "flu"]
}"#;

#[test]
fn test_only_winning_terminal_is_announced() {
    let mut convo = start(CLINIC);
    assert_eq!(convo.step(None).utterance, "Do you have a fever?");
    assert_eq!(convo.step(Some("yes")).utterance, "Do you have a rash?");
    assert_eq!(convo.step(Some("no")).utterance, "Do you have a cough?");

    let step = convo.step(Some("yes"));
    assert!(step.finished);
    assert_eq!(step.utterance, "Possibly flu.");
    assert!(!step.utterance.contains("measles"));
    assert_eq!(fact(&convo, "measles").truth, Truth::False);
}

#[test]
fn test_dead_terminal_detaches_but_shared_fact_survives() {
    let mut convo = start(CLINIC);
    convo.step(None);
    convo.step(Some("yes"));
    convo.step(Some("no"));

    assert_eq!(fact(&convo, "measles").truth, Truth::False);
    assert!(fact(&convo, "rash").parents.is_empty());
    assert_eq!(fact(&convo, "fever").parents, vec!["flu"]);
}

/// The same fever entity behind two facts in different branches
const SHARED_ENTITY: &str = r#"{
    "facts": [
        {"id": "temp", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "TEMP", "name": "temperature",
                    "value_type": "number", "expression": {"op": ">", "values": 100}}},
        {"id": "feverish", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "TEMP", "name": "temperature",
                    "value_type": "number", "expression": {"op": ">=", "values": 99}}},
        {"id": "rash", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "RASH", "name": "a rash"}},
        {"id": "cough", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "COUGH", "name": "a cough"}},
        {"id": "measles", "type": "composite", "operator": "AND", "text": "Possibly measles.", "facts": ["temp", "rash"]},
        {"id": "flu", "type": "composite", "operator": "AND", "text": "Possibly flu.", "facts": ["feverish", "cough"]}
    ],
    "terminals": ["measles", "flu"]
}"#;

#[test]
fn test_answer_fans_out_to_same_entity() {
    let mut convo = start(SHARED_ENTITY);
    assert_eq!(convo.step(None).utterance, "What is your temperature?");

    let step = convo.step(Some("103"));
    assert!(!step.finished);

    let temp = fact(&convo, "temp");
    let feverish = fact(&convo, "feverish");
    assert_eq!(temp.truth, Truth::True);
    assert_eq!(feverish.truth, Truth::True);
    assert_eq!(feverish.value, Some(FactValue::Number(103.0)));
}

/// cold asks yes/no about temperature, flu compares the reading
const TEMPERATURE_TWO_WAYS: &str = r#"{
    "facts": [
        {"id": "has_temp", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "TEMP", "name": "temperature",
                    "value_type": "yesno"}},
        {"id": "high_temp", "type": "entity",
         "entity": {"class": 2, "subclass": 1, "id": "TEMP", "name": "temperature",
                    "value_type": "number", "expression": {"op": ">", "values": 100}}},
        {"id": "cough", "type": "entity", "entity": {"class": 2, "subclass": 1, "id": "COUGH", "name": "a cough"}},
        {"id": "cold", "type": "composite", "operator": "AND", "text": "Possibly a cold.", "facts": ["has_temp", "cough"]},
        {"id": "flu", "type": "composite", "operator": "AND", "text": "Possibly flu.", "facts": ["high_temp", "cough"]}
    ],
    "terminals": ["cold", "flu"]
}"#;

#[test]
fn test_fan_out_peers_keep_their_own_matcher() {
    let mut convo = start(TEMPERATURE_TWO_WAYS);
    assert_eq!(convo.step(None).utterance, "Do you have temperature?");

    let step = convo.step(Some("yes"));
    assert_eq!(step.utterance, "Do you have a cough?");

    assert_eq!(fact(&convo, "has_temp").truth, Truth::True);
    let high_temp = fact(&convo, "high_temp");
    assert_eq!(high_temp.truth, Truth::Unresolved);
    assert_eq!(high_temp.value, None);
    assert_eq!(fact(&convo, "flu").truth, Truth::Unresolved);

    let done = convo.step(Some("yes"));
    assert!(done.finished);
    assert_eq!(done.utterance, "Possibly a cold.");
}

#[test]
fn test_free_text_answers() {
    let doc = r#"{
        "facts": [
            {"id": "pain", "type": "entity",
             "question": "How would you describe the pain?",
             "entity": {"class": 2, "subclass": 3, "id": "PAIN",
                        "value_type": {"name": "string", "accept": ["token"]},
                        "expression": {"op": "in", "values": ["sharp", "stabbing"]}}},
            {"id": "appendix", "type": "composite", "operator": "AND",
             "text": "Please go to an emergency room.", "facts": ["pain"]}
        ],
        "terminals": ["appendix"]
    }"#;
    let mut convo = start(doc);
    assert_eq!(convo.step(None).utterance, "How would you describe the pain?");

    let step = convo.step(Some("stabbing"));
    assert!(step.finished);
    assert_eq!(step.utterance, "Please go to an emergency room.");
}

#[test]
fn test_construction_errors_surface() {
    let config = EngineConfig::default;
    let parser = || Arc::new(lexicon());

    let cycle = r#"{"facts": [
        {"id": "a", "type": "composite", "operator": "AND", "facts": ["b"]},
        {"id": "b", "type": "composite", "operator": "AND", "facts": ["a"]}
    ], "terminals": ["a"]}"#;
    assert!(matches!(
        ConvoProtocol::from_json(cycle, config(), parser()),
        Err(EngineError::Protocol(ProtocolError::Cycle(_)))
    ));

    let dangling = r#"{"facts": [
        {"id": "a", "type": "composite", "operator": "OR", "facts": ["ghost"]}
    ], "terminals": ["a"]}"#;
    assert!(matches!(
        ConvoProtocol::from_json(dangling, config(), parser()),
        Err(EngineError::Protocol(ProtocolError::UnknownDependency { .. }))
    ));

    let value_type = r#"{"facts": [
        {"id": "x", "type": "entity", "entity": {"class": 1, "subclass": 1, "id": "X", "value_type": "colour"}},
        {"id": "a", "type": "composite", "operator": "OR", "facts": ["x"]}
    ], "terminals": ["a"]}"#;
    assert!(matches!(
        ConvoProtocol::from_json(value_type, config(), parser()),
        Err(EngineError::Protocol(ProtocolError::UnknownValueType(_)))
    ));
}

#[test]
fn test_config_from_toml_changes_wording() {
    let config = EngineConfig::from_toml(
        r#"
        apology_prefix = "Pardon? "
        yes_no_prefix = "Are you experiencing"
        "#,
    )
    .unwrap();
    let mut convo = ConvoProtocol::from_json(EITHER, config, Arc::new(lexicon())).unwrap();

    assert_eq!(convo.step(None).utterance, "Are you experiencing a cough?");
    assert_eq!(
        convo.step(Some("maybe")).utterance,
        "Pardon? Are you experiencing a cough?"
    );
}

/// t1 = AND(alpha, beta), t2 = AND(gamma, OR(alpha, beta))
const ALGEBRA: &str = r#"{
    "facts": [
        {"id": "alpha", "type": "entity", "entity": {"class": 3, "subclass": 1, "id": "A", "name": "alpha"}},
        {"id": "beta", "type": "entity", "entity": {"class": 3, "subclass": 1, "id": "B", "name": "beta"}},
        {"id": "gamma", "type": "entity", "entity": {"class": 3, "subclass": 1, "id": "C", "name": "gamma"}},
        {"id": "either", "type": "composite", "operator": "OR", "facts": ["alpha", "beta"]},
        {"id": "t1", "type": "composite", "operator": "AND", "text": "t1", "facts": ["alpha", "beta"]},
        {"id": "t2", "type": "composite", "operator": "AND", "text": "t2", "facts": ["gamma", "either"]}
    ],
    "terminals": ["t1", "t2"]
}"#;

proptest! {
    #[test]
    fn prop_outcome_agrees_with_boolean_algebra(a: bool, b: bool, c: bool) {
        let mut convo = ConvoProtocol::from_json(
            ALGEBRA,
            EngineConfig::default(),
            Arc::new(lexicon()),
        )
        .unwrap();

        let mut step = convo.step(None);
        for _ in 0..4 {
            if step.finished {
                break;
            }
            let answer = if step.utterance.ends_with("alpha?") {
                a
            } else if step.utterance.ends_with("beta?") {
                b
            } else {
                prop_assert!(step.utterance.ends_with("gamma?"));
                c
            };
            step = convo.step(Some(if answer { "yes" } else { "no" }));
        }
        prop_assert!(step.finished);

        let t1 = a && b;
        let t2 = c && (a || b);
        match convo.outcome() {
            Some(Outcome::Terminal(id)) if id == "t1" => prop_assert!(t1),
            Some(Outcome::Terminal(id)) if id == "t2" => prop_assert!(t2),
            Some(Outcome::NoOutcome) => prop_assert!(!t1 && !t2),
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}
