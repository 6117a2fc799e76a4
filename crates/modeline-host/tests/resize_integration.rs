//! End-to-end resize scenarios against the in-memory display server.

use std::sync::Arc;

use modeline_host::application::display_server::OutputId;
use modeline_host::application::error::ResizeError;
use modeline_host::application::resolution_manager::{ResizeSettings, ResolutionManager};
use modeline_host::infrastructure::display_server::mock::{DisplayCall, MockDisplayServer};
use modeline_host::infrastructure::reporting::TracingReporter;
use modeline_host::infrastructure::storage::config::HostConfig;

fn build(display: MockDisplayServer, settings: ResizeSettings) -> (Arc<MockDisplayServer>, Arc<TracingReporter>, ResolutionManager) {
    let display = Arc::new(display);
    let reporter = Arc::new(TracingReporter::new());
    let manager = ResolutionManager::new(display.clone(), reporter.clone(), settings).expect("manager");
    display.clear_calls();
    (display, reporter, manager)
}

fn capacity(max_new_modes: usize) -> ResizeSettings {
    ResizeSettings {
        enabled: true,
        max_new_modes,
    }
}

fn creates(display: &MockDisplayServer) -> usize {
    display
        .calls()
        .iter()
        .filter(|c| matches!(c, DisplayCall::CreateMode { .. }))
        .count()
}

#[test]
fn test_add_same_size_twice_creates_mode_once() {
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    assert_eq!(manager.add_size(1366, 768), Some((1366, 768)));
    assert_eq!(manager.add_size(1366, 768), Some((1366, 768)));

    assert_eq!(creates(&display), 1);
}

#[test]
fn test_resize_to_listed_size_never_creates_mode() {
    // Arrange
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    // Act
    let added = manager.add_size(1024, 768);
    let resized = manager.resize_to(1280, 720).expect("resize");

    // Assert
    assert_eq!(added, Some((1024, 768)));
    assert_eq!(resized, (1280, 720));
    assert_eq!(creates(&display), 0);
    assert!(manager.cached_sizes().is_empty());
    assert_eq!(manager.current_size(), Some((1280, 720)));
}

#[test]
fn test_capacity_two_evicts_oldest_mode() {
    // Arrange
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(2));

    // Act
    manager.add_size(800, 600).expect("800x600");
    manager.add_size(1152, 864).expect("1152x864");
    manager.add_size(1280, 1024).expect("1280x1024");

    // Assert
    assert_eq!(manager.cached_sizes(), vec![(1152, 864), (1280, 1024)]);
    assert_eq!(display.live_count(), 2);
    assert_eq!(display.attached_to(OutputId(0x42)).len(), 2);
}

#[test]
fn test_many_adds_keep_cache_at_capacity() {
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(3));

    for width in (800..=1600).step_by(100) {
        manager.add_size(width, 600).expect("add");
    }

    assert_eq!(manager.cached_sizes(), vec![(1400, 600), (1500, 600), (1600, 600)]);
    assert_eq!(display.live_count(), 3);
}

#[test]
fn test_remove_absent_size_makes_no_server_call() {
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    let removed = manager.remove_size(1000, 700).expect("remove");

    assert!(!removed);
    assert!(display.calls().is_empty());
}

#[test]
fn test_remove_added_size_detaches_then_destroys() {
    // Arrange
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));
    manager.add_size(1000, 700).expect("add");
    display.clear_calls();

    // Act
    let removed = manager.remove_size(1000, 700).expect("remove");

    // Assert
    assert!(removed);
    let calls = display.calls();
    assert!(matches!(calls.as_slice(), [DisplayCall::DeleteOutputMode { .. }, DisplayCall::DestroyMode { .. }]));
    assert_eq!(display.live_count(), 0);
    assert!(manager.cached_sizes().is_empty());
}

#[test]
fn test_set_unlisted_size_only_reads_configuration() {
    let (display, _, manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    let result = manager.set_size(1000, 700);

    assert!(matches!(
        result,
        Err(ResizeError::SizeNotFound {
            width: 1000,
            height: 700
        })
    ));
    assert_eq!(display.calls(), vec![DisplayCall::ScreenConfig]);
}

#[test]
fn test_headless_server_reports_root_size_and_refuses_resize() {
    // Arrange
    let (display, reporter, mut manager) = build(MockDisplayServer::headless(), capacity(4));

    // Act
    let size = manager.current_size();
    let added = manager.add_size(1000, 700);

    // Assert
    assert_eq!(size, Some((5120, 3200)));
    assert_eq!(added, None);
    assert_eq!(creates(&display), 0);
    assert_eq!(
        reporter.reported_keys(),
        vec!["no-static-sizes".to_string(), "randr-unusable".to_string()]
    );
}

#[test]
fn test_disabled_configuration_never_touches_server() {
    // Arrange
    let mut config = HostConfig::default();
    config
        .apply_env_overrides(|key| (key == "MODELINE_RESIZE").then(|| "off".to_string()))
        .expect("override");
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), config.resize_settings());

    // Act
    let set = manager.set_size(1280, 720);
    let resized = manager.resize_to(1000, 700);

    // Assert
    assert!(matches!(set, Err(ResizeError::Disabled)));
    assert!(matches!(resized, Err(ResizeError::Disabled)));
    assert!(display.calls().is_empty());
}

#[test]
fn test_eviction_with_failing_release_still_bounds_cache() {
    let mut server = MockDisplayServer::virtual_1080p();
    server.fail_destroy = true;
    let (display, _, mut manager) = build(server, capacity(2));

    manager.add_size(800, 600).expect("a");
    manager.add_size(900, 600).expect("b");
    manager.add_size(1000, 600).expect("c");

    assert_eq!(manager.cached_sizes().len(), 2);
    assert_eq!(display.live_count(), 3, "the evicted mode leaks on the server");
}

#[test]
fn test_second_output_is_reported_once_across_adds() {
    let mut server = MockDisplayServer::virtual_1080p();
    server.outputs.push(OutputId(0x43));
    let (display, reporter, mut manager) = build(server, capacity(4));

    manager.add_size(1000, 700).expect("a");
    manager.add_size(1100, 700).expect("b");

    assert_eq!(reporter.reported_keys(), vec!["multiple-outputs".to_string()]);
    assert!(display.attached_to(OutputId(0x42)).is_empty());
}

#[test]
fn test_resize_to_synthesized_size_then_release_all() {
    // Arrange
    let (display, _, mut manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    // Act
    let size = manager.resize_to(1000, 700).expect("resize");
    let now = manager.current_size();
    manager.set_size(1920, 1080).expect("back to 1080p");
    let failures = manager.release_all();

    // Assert
    assert_eq!(size, (1000, 700));
    assert_eq!(now, Some((1000, 700)));
    assert_eq!(failures, 0);
    assert_eq!(display.live_count(), 0);
    assert!(!manager.list_sizes().contains(&(1000, 700)));
}

#[test]
fn test_refresh_rate_from_active_output() {
    let (_, _, manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    assert_eq!(manager.refresh_rate(), Some(60));
    assert_eq!(manager.per_output_refresh_rates().get("DUMMY0"), Some(&60));
}

#[test]
fn test_read_only_queries() {
    let (_, _, manager) = build(MockDisplayServer::virtual_1080p(), capacity(4));

    assert_eq!(manager.extension_version(), Some((1, 5)));
    assert_eq!(manager.screen_count(), Some(1));
    assert_eq!(manager.physical_size_mm(), Some((508, 285)));
}
