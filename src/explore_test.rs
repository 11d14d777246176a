// Unit tests for explore module

use super::*;
use crate::fake_page::FakePage;
use crate::selectors::CACHE_FILE;
use std::io::Cursor;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROPOSALS: &str = r#"[
  {"brief": "Inventory overview", "name": "Transfers", "selector": "a.transfers", "description": "Stock moves"},
  {"brief": "Inventory overview", "name": "Products", "selector": "a.products", "description": "Catalog"}
]"#;

const STEPS: &str = r#"[
  {"selector": "button.o_list_button_add", "action": "click", "description": "Create a transfer"},
  {"selector": "input.o_searchview_input", "action": "type", "description": "Search"},
  {"action": "click", "description": "no selector"}
]"#;

fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::new("http://odoo.local:8069", "admin", "admin");
    settings.output_root = dir.path().to_path_buf();
    settings
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

/// System prompts of every chat request the server received, in order
async fn system_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["messages"][0]["content"].as_str().unwrap().to_string()
        })
        .collect()
}

async fn mount_replies(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_string_contains("brief summary of the page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&format!("```json\n{}\n```", PROPOSALS))),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Extract key interactive elements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(STEPS)))
        .mount(server)
        .await;
}

#[test]
fn test_parse_bare_array() {
    let proposals = parse_selector_proposals(PROPOSALS);
    assert_eq!(proposals.len(), 2);
    assert_eq!(proposals[0].name, "Transfers");
    assert_eq!(proposals[1].selector, "a.products");
}

#[test]
fn test_parse_fenced_array() {
    let reply = format!("Here are the selectors:\n```json\n{}\n```\nDone.", PROPOSALS);
    let proposals = parse_selector_proposals(&reply);
    assert_eq!(proposals.len(), 2);
}

#[test]
fn test_parse_items_object() {
    let reply = format!(r#"{{"items": {}}}"#, PROPOSALS);
    assert_eq!(parse_selector_proposals(&reply).len(), 2);
}

#[test]
fn test_parse_unusable_replies() {
    assert!(parse_selector_proposals("I could not find any menus.").is_empty());
    assert!(parse_selector_proposals(r#"{"selectors": []}"#).is_empty());
    assert!(parse_selector_proposals(r#""a.transfers""#).is_empty());
    assert!(parse_selector_proposals(r#"[{"name": "no selector"}, 42]"#).is_empty());
}

#[test]
fn test_parse_interaction_steps_drops_selectorless_items() {
    let steps = parse_interaction_steps(STEPS);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].action, "click");
    assert_eq!(steps[1].selector, "input.o_searchview_input");
    assert!(parse_interaction_steps("no steps here").is_empty());
}

#[test]
fn test_steps_prompt_names_module() {
    let prompt = steps_prompt("Purchase");
    assert!(prompt.contains("in the Purchase module"));
    assert!(prompt.contains("'action' (click/type)"));
}

#[test]
fn test_truncate_chars_respects_boundaries() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(truncate_chars("abc", 10), "abc");
}

#[tokio::test]
async fn test_snapshot_truncates_html() {
    let dir = TempDir::new().unwrap();
    let page = FakePage {
        source: "x".repeat(6000),
        title: "Inventory Overview".into(),
        ..Default::default()
    };

    let snapshot = PageSnapshot::capture(&page).await.unwrap();
    assert_eq!(snapshot.html.len(), SNAPSHOT_HTML_LIMIT + 3);
    assert!(snapshot.html.ends_with("..."));

    let path = snapshot.write(dir.path(), 3).await.unwrap();
    assert!(path.ends_with("page_3.json"));
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["title"], "Inventory Overview");
    assert!(value["captured_at"].is_string());
}

#[tokio::test]
async fn test_explore_loop_visits_and_records() {
    let server = MockServer::start().await;
    mount_replies(&server).await;

    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let mut page = FakePage::with_present(&["css:a.transfers"]);
    page.source = "y".repeat(25_000);
    let client = ChatClient::new(&server.uri(), Some("k".into()), "m");

    let input = Cursor::new("yes\na.transfers\nbutton.missing\n\nEXIT\na.products\n");
    let mut out = Vec::new();
    let summary = Explorer::new(&page, &client, &settings, "Inventory")
        .with_settle(Duration::ZERO)
        .run(input, &mut out)
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.visited, vec!["a.transfers"]);
    assert_eq!(summary.failed, vec!["button.missing"]);
    // unmatched selectors are never clicked
    assert_eq!(page.clicks(), vec!["css:a.transfers".to_string()]);

    let module_dir = settings.module_dir("Inventory");
    assert!(module_dir.join("page_1.json").exists());
    assert!(module_dir.join("page_2.json").exists());
    assert!(!module_dir.join("page_3.json").exists());
    assert!(!module_dir.join("page_3_ai.json").exists());

    let steps: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(module_dir.join("page_2_ai.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(steps["ai_steps"].as_array().unwrap().len(), 2);
    assert_eq!(steps["ai_steps"][0]["selector"], "button.o_list_button_add");
    assert!(module_dir.join("page_1_ai.json").exists());

    let cache = MenuSelectors::load(&module_dir.join(CACHE_FILE)).await;
    assert_eq!(cache.available, vec!["a.products"]);
    assert_eq!(cache.done, vec!["a.transfers"]);

    // steps for page 1, one proposal, steps for page 2
    let prompts = system_prompts(&server).await;
    assert_eq!(prompts.len(), 3);
    assert_eq!(prompts[1], PROPOSAL_PROMPT);
    assert_eq!(prompts[0], steps_prompt("Inventory"));
    assert_eq!(prompts[2], steps_prompt("Inventory"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(
        body["messages"][1]["content"].as_str().unwrap().len(),
        SOURCE_LIMIT
    );

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Exiting traversal."));
}

#[tokio::test]
async fn test_explore_uses_cached_selectors_without_proposal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    MenuSelectors {
        available: vec!["a.cached".into()],
        done: vec![],
    }
    .save(&settings.selector_cache_path("Sales"))
    .await
    .unwrap();

    let page = FakePage::with_present(&["css:a.cached"]);
    let client = ChatClient::new(&server.uri(), Some("k".into()), "m");

    let summary = Explorer::new(&page, &client, &settings, "Sales")
        .with_settle(Duration::ZERO)
        .run(Cursor::new("a.cached\n"), std::io::sink())
        .await
        .unwrap();

    assert_eq!(summary.visited, vec!["a.cached"]);
    // the cache emptied after the click, so one proposal was attempted before EOF
    let proposals = system_prompts(&server)
        .await
        .into_iter()
        .filter(|p| p == PROPOSAL_PROMPT)
        .count();
    assert_eq!(proposals, 1);

    // unanswered step requests still leave a file behind
    let steps: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(settings.module_dir("Sales").join("page_2_ai.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(steps["ai_steps"], serde_json::json!([]));
}

#[tokio::test]
async fn test_declining_to_save_proposals_ends_traversal() {
    let server = MockServer::start().await;
    mount_replies(&server).await;
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let page = FakePage::with_present(&["css:a.transfers"]);
    let client = ChatClient::new(&server.uri(), Some("k".into()), "m");

    let mut out = Vec::new();
    let summary = Explorer::new(&page, &client, &settings, "Inventory")
        .with_settle(Duration::ZERO)
        .run(Cursor::new("no\na.transfers\n"), &mut out)
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert!(summary.visited.is_empty());
    assert!(page.clicks().is_empty());
    assert!(!settings.selector_cache_path("Inventory").exists());

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Do you want to save the data? (yes/no): "));
    assert!(printed.contains("Exiting traversal."));
}

#[tokio::test]
async fn test_explore_without_api_key_still_prompts() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let page = FakePage::default();
    let client = ChatClient::new("http://127.0.0.1:9", None, "m");

    let summary = Explorer::new(&page, &client, &settings, "CRM")
        .with_settle(Duration::ZERO)
        .run(Cursor::new("exit\n"), std::io::sink())
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert!(summary.visited.is_empty());

    let steps: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(settings.module_dir("CRM").join("page_1_ai.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(steps["ai_steps"], serde_json::json!([]));
}
