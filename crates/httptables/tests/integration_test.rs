//! 策略引擎集成测试
//!
//! 覆盖规则加载、字段访问、首个匹配生效和默认策略回退的完整流程。

use httptables::{
    ConfigurationError, Engine, EngineOptions, Matcher, Policy, Rule, RuleLoader,
};
use serde_json::{json, Value};

/// 模拟一个带有多个请求头的请求
fn create_request() -> Value {
    json!({
        "headers": {
            "url": "/test",
            "method": "POST",
            "accept-encoding": "application/json",
            "x-sf-version": "1.0",
            "x-sf-tpl": "test11"
        }
    })
}

fn engine() -> Engine<Value> {
    Engine::new(EngineOptions::default())
}

/// 指令：把参数原样组成数组匹配器
fn pair(args: &[Matcher]) -> Matcher {
    Matcher::Any(args.to_vec())
}

/// 使用全部匹配器类型的规则
fn full_rule(policy: &str, url_pattern: &str) -> Rule {
    Rule::new(policy)
        .when("url", Matcher::pattern(url_pattern).unwrap())
        .when("method", Matcher::any(["POST".into(), "GET".into()]))
        .when(
            "accept-encoding",
            Matcher::predicate(|_| Matcher::any(["application/json".into(), "text/html".into()])),
        )
        .when("x-sf-version", "1.0")
        .when(
            "x-sf-tpl",
            Matcher::instruction(pair, vec![Matcher::pattern("test1").unwrap(), "tpl".into()]),
        )
}

// ==================== 引擎配置 ====================

#[test]
fn test_accept_is_default_policy() {
    assert_eq!(engine().default_policy(), Policy::Accept);
}

#[test]
fn test_default_policy_falls_back_when_unknown() {
    let engine: Engine<Value> = Engine::new(EngineOptions::with_default_policy("WAZA"));
    assert_eq!(engine.default_policy(), Policy::Accept);
}

#[test]
fn test_default_policy_can_be_changed() {
    let engine: Engine<Value> = Engine::new(EngineOptions::with_default_policy("DROP"));
    assert_eq!(engine.default_policy(), Policy::Drop);
}

// ==================== 规则应用 ====================

#[test]
fn test_rules_must_be_a_sequence() {
    let err = engine()
        .apply_value(Some(&json!({})), &json!({}))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::RulesNotSequence { .. }));

    let err = engine()
        .apply_value(Some(&create_request()), &json!("not-a-sequence"))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::RulesNotSequence { .. }));
}

#[test]
fn test_request_must_be_present() {
    let err = engine().apply_rules(None, &[]).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingRequest));

    let err = engine().apply_value(None, &json!([])).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingRequest));
}

#[test]
fn test_bad_conditions_surface_as_error() {
    let err = engine()
        .apply_value(Some(&create_request()), &json!([{ "conditions": "bad" }]))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidConditions { .. }));
}

#[test]
fn test_empty_rules_return_default_policy() {
    let policy = engine().apply_rules(Some(&json!({})), &[]).unwrap();
    assert_eq!(policy, engine().default_policy());

    let dropping: Engine<Value> = Engine::new(EngineOptions::with_default_policy("DROP"));
    assert_eq!(dropping.apply_rules(Some(&json!({})), &[]).unwrap(), Policy::Drop);
}

#[test]
fn test_matching_policy_is_returned() {
    let rules = vec![full_rule("DROP", "test")];
    let policy = engine().apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Drop);
}

#[test]
fn test_first_match_wins() {
    // 第一条规则的 url 不匹配，第二条全部匹配
    let rules = vec![full_rule("ACCEPT", "blop"), full_rule("DROP", "test")];
    let policy = engine().apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Drop);

    // 两条都匹配时只取第一条
    let rules = vec![full_rule("ACCEPT", "test"), full_rule("DROP", "test")];
    let dropping: Engine<Value> = Engine::new(EngineOptions::with_default_policy("DROP"));
    let policy = dropping.apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Accept);
}

#[test]
fn test_first_match_with_unknown_policy_uses_default() {
    let rules = vec![full_rule("WAZA", "test"), full_rule("DROP", "test")];
    let policy = engine().apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Accept);
}

#[test]
fn test_missing_field_never_matches() {
    let rules = vec![Rule::dropping()
        .when("method", "POST")
        .when("x-absent", true)];
    let policy = engine().apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Accept);
}

#[test]
fn test_empty_disjunction_never_matches() {
    let rules = vec![Rule::dropping().when("method", Matcher::Any(vec![]))];
    let policy = engine().apply_rules(Some(&create_request()), &rules).unwrap();
    assert_eq!(policy, Policy::Accept);
}

#[test]
fn test_empty_conditions_match_every_request() {
    let rules = vec![Rule::dropping()];
    assert_eq!(
        engine().apply_rules(Some(&json!({})), &rules).unwrap(),
        Policy::Drop
    );
    assert_eq!(
        engine().apply_rules(Some(&create_request()), &rules).unwrap(),
        Policy::Drop
    );
}

#[test]
fn test_apply_rules_is_idempotent() {
    let engine = engine();
    let rules = vec![full_rule("ACCEPT", "blop"), full_rule("DROP", "test")];
    let request = create_request();

    let first = engine.apply_rules(Some(&request), &rules).unwrap();
    for _ in 0..10 {
        assert_eq!(engine.apply_rules(Some(&request), &rules).unwrap(), first);
    }
}

#[test]
fn test_result_is_always_a_known_policy() {
    let engine = engine();
    let requests = [json!({}), create_request(), json!({ "headers": { "method": "PUT" } })];
    let rule_sets = [
        vec![],
        vec![Rule::new("WAZA")],
        vec![full_rule("DROP", "test")],
        vec![Rule::new("0").when("method", "PUT")],
    ];

    for request in &requests {
        for rules in &rule_sets {
            let policy = engine.apply_rules(Some(request), rules).unwrap();
            assert!(Policy::ALL.contains(&policy));
        }
    }
}

// ==================== 典型场景 ====================

#[test]
fn test_method_and_url_scenario() {
    let mut engine = engine();
    engine.set_field_accessor(|req: &Value, field: &str| req.get(field).cloned());

    let rules = vec![Rule::dropping()
        .when("method", Matcher::any(["POST".into(), "GET".into()]))
        .when("url", Matcher::pattern(r"^/api/").unwrap())];

    let post = json!({ "method": "POST", "url": "/api/users" });
    assert_eq!(engine.apply_rules(Some(&post), &rules).unwrap(), Policy::Drop);

    let put = json!({ "method": "PUT", "url": "/api/users" });
    assert_eq!(engine.apply_rules(Some(&put), &rules).unwrap(), Policy::Accept);
}

#[test]
fn test_instruction_scenario() {
    let matcher = Matcher::instruction(pair, vec![Matcher::pattern("^v").unwrap(), "beta".into()]);
    assert!(matcher.matches(Some(&json!("v2"))));
}

#[test]
fn test_json_rule_document_with_registered_instruction() {
    let mut engine = engine();
    engine.loader_mut().register_instruction("pair", pair);

    let document = json!([
        {
            "name": "legacy-templates",
            "policy": "DROP",
            "conditions": {
                "x-sf-tpl": { "instruction": "pair", "args": [{ "pattern": "test1" }, "tpl"] },
                "method": ["POST", "GET"]
            }
        }
    ]);

    let policy = engine.apply_value(Some(&create_request()), &document).unwrap();
    assert_eq!(policy, Policy::Drop);
}

#[test]
fn test_loader_and_engine_agree() {
    let loader = RuleLoader::new();
    let rules = loader
        .load_str(r#"[{ "policy": "DROP", "conditions": { "url": { "pattern": "^/te" } } }]"#)
        .unwrap();

    let engine = engine().with_rules(rules);
    assert_eq!(engine.test(&create_request()).unwrap(), Policy::Drop);
    assert_eq!(
        engine.test(&json!({ "headers": { "url": "/other" } })).unwrap(),
        Policy::Accept
    );
}
