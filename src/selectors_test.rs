// Unit tests for selectors module

use super::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[tokio::test]
async fn test_load_missing_empty_and_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CACHE_FILE);
    assert_eq!(MenuSelectors::load(&path).await, MenuSelectors::default());

    std::fs::write(&path, "   \n").unwrap();
    assert_eq!(MenuSelectors::load(&path).await, MenuSelectors::default());

    std::fs::write(&path, "{not json").unwrap();
    assert_eq!(MenuSelectors::load(&path).await, MenuSelectors::default());
}

#[tokio::test]
async fn test_load_tolerates_missing_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CACHE_FILE);
    std::fs::write(&path, r#"{"available": ["a.menu"]}"#).unwrap();

    let cache = MenuSelectors::load(&path).await;
    assert_eq!(cache.available, vec!["a.menu"]);
    assert!(cache.done.is_empty());
}

#[tokio::test]
async fn test_save_creates_directories_and_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odoo17").join("Inventory").join(CACHE_FILE);
    let cache = MenuSelectors {
        available: vec!["a.o_menu_entry_lvl_1".into()],
        done: vec!["button.o_list_button_add".into()],
    };

    cache.save(&path).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"available\""));
    assert_eq!(MenuSelectors::load(&path).await, cache);
}

#[test]
fn test_mark_done_moves_selector() {
    let mut cache = MenuSelectors {
        available: vec!["a".into(), "b".into()],
        done: vec![],
    };
    cache.mark_done("a");
    cache.mark_done("a");
    assert_eq!(cache.available, vec!["b"]);
    assert_eq!(cache.done, vec!["a"]);

    // typed selectors that were never proposed are still recorded
    cache.mark_done("c");
    assert_eq!(cache.done, vec!["a", "c"]);
}

#[test]
fn test_extend_available_skips_known() {
    let mut cache = MenuSelectors {
        available: vec!["a".into()],
        done: vec!["b".into()],
    };
    let added = cache.extend_available(["a", "b", "c", "", "c"]);
    assert_eq!(added, 1);
    assert_eq!(cache.available, vec!["a", "c"]);
}
