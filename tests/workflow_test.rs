// End-to-end pipeline over mocked Odoo and chat-completion endpoints

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fantoccini::Locator;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use odoo_scout::credentials::SESSION_EXPIRY;
use odoo_scout::navigator::{APPS_MENU, MAIN_NAVBAR, landing_marker, menu_entry_xpath};
use odoo_scout::pipeline::run_stages;
use odoo_scout::session::RetryPolicy;
use odoo_scout::{
    Authenticator, ChatClient, CredentialSet, FormLogin, ModuleSelector, Page, ScoutError,
    Settings, dump,
};

const LOGIN_PAGE: &str = r#"<html><head><meta name="csrf_token" content="meta-tok"/></head>
<body><form><input type="hidden" name="csrf_token" value="form-tok"/></form></body></html>"#;

/// Page stand-in that knows which locators exist
struct OdooPage {
    present: HashSet<String>,
    markup: Vec<String>,
    installed: Mutex<Option<CredentialSet>>,
    clicks: Mutex<Vec<String>>,
}

fn key(locator: &Locator<'_>) -> String {
    match locator {
        Locator::Css(s) | Locator::XPath(s) => s.to_string(),
        _ => String::new(),
    }
}

impl OdooPage {
    fn landing(label: &str) -> Self {
        let present = [
            MAIN_NAVBAR.to_string(),
            APPS_MENU.to_string(),
            menu_entry_xpath(label),
            landing_marker(label).unwrap().to_string(),
        ];
        OdooPage {
            present: present.into_iter().collect(),
            markup: vec![
                "<html><body><nav class=\"o_main_navbar\"></nav></body></html>".into(),
                "<body><nav class=\"o_main_navbar\"></nav></body>".into(),
                "<nav class=\"o_main_navbar\"></nav>".into(),
            ],
            installed: Mutex::new(None),
            clicks: Mutex::new(Vec::new()),
        }
    }

    fn check(&self, locator: &Locator<'_>) -> Result<()> {
        if self.present.contains(&key(locator)) {
            Ok(())
        } else {
            Err(anyhow!("no such element: {}", key(locator)))
        }
    }
}

#[async_trait]
impl Page for OdooPage {
    async fn goto(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn wait_for(&self, locator: Locator<'_>, _timeout: Duration) -> Result<()> {
        self.check(&locator)
    }

    async fn count(&self, locator: Locator<'_>) -> Result<usize> {
        Ok(usize::from(self.check(&locator).is_ok()))
    }

    async fn click(&self, locator: Locator<'_>) -> Result<()> {
        self.clicks.lock().unwrap().push(key(&locator));
        self.check(&locator)
    }

    async fn fill(&self, _locator: Locator<'_>, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn outer_html_all(&self, _locator: Locator<'_>) -> Result<Vec<String>> {
        Ok(self.markup.clone())
    }

    async fn add_cookies(&self, credentials: &CredentialSet) -> Result<()> {
        *self.installed.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<cookie::Cookie<'static>>> {
        Ok(Vec::new())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn title(&self) -> Result<String> {
        Ok("Odoo".into())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.markup.join(""))
    }
}

async fn mock_odoo() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/web/login"))
        .and(body_string_contains("csrf_token=form-tok"))
        .and(body_string_contains("login=admin"))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("Location", "/web")
                .insert_header("Set-Cookie", "session_id=live; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/web"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;
    server
}

fn settings(odoo: &MockServer, dir: &TempDir) -> Settings {
    let mut settings = Settings::new(&odoo.uri(), "admin", "secret");
    settings.output_root = dir.path().to_path_buf();
    settings
}

fn fast_login() -> FormLogin {
    FormLogin::new(RetryPolicy {
        base_delay: Duration::from_millis(1),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_form_login_produces_browser_cookies() {
    let odoo = mock_odoo().await;
    let dir = TempDir::new().unwrap();

    let credentials = fast_login()
        .authenticate(&settings(&odoo, &dir))
        .await
        .unwrap();

    let session = credentials.get("session_id").unwrap();
    assert_eq!(session.value, "live");
    assert_eq!(session.domain, "127.0.0.1");
    assert_eq!(session.path, "/");
    assert_eq!(session.expires, SESSION_EXPIRY);
    assert!(session.http_only);

    let json = serde_json::to_value(session).unwrap();
    assert_eq!(json["httpOnly"], true);
    assert_eq!(json["sameSite"], "Lax");
}

#[tokio::test]
async fn test_full_run_writes_dump_and_report() {
    let odoo = mock_odoo().await;
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer or-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "### Menus\n- Transfers"}}]
        })))
        .expect(1)
        .mount(&llm)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = settings(&odoo, &dir);
    let page = OdooPage::landing("Purchase");
    let module = ModuleSelector::parse("purchase", &settings.modules).unwrap();
    let client = ChatClient::new(&llm.uri(), Some("or-key".into()), "test/model");

    let report = run_stages(&page, &fast_login(), &settings, &module, Some(&client))
        .await
        .unwrap();

    assert_eq!(report.module, "Purchase");
    assert_eq!(report.elements, 3);
    assert!(report.warnings.is_empty());

    let installed = page.installed.lock().unwrap().clone().unwrap();
    assert_eq!(installed.get("session_id").unwrap().value, "live");
    assert_eq!(
        page.clicks.lock().unwrap().clone(),
        vec![APPS_MENU.to_string(), menu_entry_xpath("Purchase")]
    );

    let text = std::fs::read_to_string(settings.dump_path("Purchase")).unwrap();
    assert_eq!(dump::markups(&text), page.markup);

    let analysis = std::fs::read_to_string(settings.report_path("Purchase")).unwrap();
    assert_eq!(analysis, "# Odoo Structure Analysis\n\n### Menus\n- Transfers");
}

#[tokio::test]
async fn test_rejected_login_is_authentication_error() {
    let odoo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&odoo)
        .await;
    Mock::given(method("POST"))
        .and(path("/web/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&odoo)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = settings(&odoo, &dir);
    let page = OdooPage::landing("Sales");
    let module = ModuleSelector::parse("Sales", &settings.modules).unwrap();

    let err = run_stages(&page, &fast_login(), &settings, &module, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ScoutError::Authentication(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(page.installed.lock().unwrap().is_none());
}
