use std::path::Path;
use std::sync::Arc;

use engagement_tracker::{BoostEntry, ContentKind};
use signal_dispatch::{DeliveryMode, MemoryTransport, SelectedText, StaticIdentity, WireElement};
use signaltap_cli::collector::Collector;
use signaltap_cli::config::CollectorConfig;
use signaltap_cli::trace::{self, Trace};
use signaltap_core_types::{ProfileId, SessionId, SourceId};
use url::Url;

fn config() -> CollectorConfig {
    let mut config = CollectorConfig::default();
    config.dispatch.endpoint = Some(Url::parse("https://collector.test/signals").unwrap());
    config.dispatch.source_id = SourceId::parse("evening-news");
    config.identity.profile_id = ProfileId::parse("profile-42");
    config.identity.session_id = SessionId::parse("session-42");
    config
}

fn find<'a>(elements: &'a [WireElement], content: &str) -> &'a WireElement {
    elements
        .iter()
        .find(|element| element.content == content)
        .unwrap_or_else(|| panic!("no element with content {content:?}"))
}

#[tokio::test(start_paused = true)]
async fn evening_edition_trace_produces_expected_batches() {
    let trace = Trace::load(Path::new("tests/fixtures/evening_edition.yaml"))
        .await
        .expect("load trace");
    let compiled = trace.compile().expect("compile trace");
    assert_eq!(compiled.skipped, 0);
    assert!(compiled.ends_with_unload());

    let config = config();
    let transport = MemoryTransport::new();
    let handle = Collector::new(
        &config,
        compiled.page,
        Arc::new(transport.clone()),
        Arc::new(StaticIdentity::new(config.identity())),
    )
    .spawn();
    trace::play(&handle, compiled.events, 1.0).await.expect("play");
    let report = handle.finish().await.expect("report");

    assert_eq!(report.events, 15);
    assert_eq!(report.tracked_elements, 6);
    assert_eq!(report.below_floor, 2);
    assert_eq!(report.batches_sent, 1);
    assert_eq!(report.beacons_accepted, 1);
    assert_eq!(report.pending_at_exit, 0);

    let deliveries = transport.deliveries();
    assert_eq!(deliveries.len(), 2);

    // Hover recorded before the first (below floor) flush still reaches the collector.
    let first = &deliveries[0];
    assert_eq!(first.mode, DeliveryMode::Post);
    assert_eq!(first.batch.url, "https://news.test/evening");
    assert_eq!(first.batch.profile.id, "profile-42");
    assert_eq!(first.batch.elements.len(), 1);
    let title = &first.batch.elements[0];
    assert_eq!(title.content, "Evening edition");
    assert_eq!(title.kind, ContentKind::Header);
    assert_eq!(title.duration, 2_600);
    assert_eq!(title.mouse_over_duration, 400);
    assert_eq!(title.id, engagement_tracker::fingerprint("h1", "Evening edition"));

    let unload = &deliveries[1];
    assert_eq!(unload.mode, DeliveryMode::Beacon);
    let elements = &unload.batch.elements;
    assert_eq!(elements.len(), 4);
    let order: Vec<(u64, u64)> = elements
        .iter()
        .map(|element| (element.mouse_over_duration, element.duration))
        .collect();
    assert_eq!(order, vec![(0, 4_800), (0, 5_100), (0, 6_000), (500, 6_000)]);

    let story = find(elements, "Storms move east overnight");
    assert_eq!(story.click_count, 1);
    assert_eq!(story.kind, ContentKind::Bullet);

    let group = elements
        .iter()
        .find(|element| element.kind == ContentKind::Group)
        .expect("group element");
    assert_eq!(group.duration, 6_000);
    assert_eq!(
        group.boost["Storms move east overnight"],
        BoostEntry { hover_ms: 500, clicks: 1 }
    );

    let lede = find(elements, "Forecasters expect heavy rain through Thursday.");
    assert_eq!(lede.selected_text, SelectedText::One(Some("heavy rain".into())));

    let inserted = find(elements, "Bridge reopens after repairs");
    assert_eq!(inserted.duration, 4_800);
}

#[tokio::test(start_paused = true)]
async fn trace_without_unload_is_drained_when_the_channel_closes() {
    let trace = Trace::from_yaml(
        r#"
url: https://news.test/short
document:
  tag: body
  children:
    - {tag: p, attrs: {id: only}, children: ["A single paragraph of news"]}
events:
  - {at: 0, type: load}
  - {at: 0, type: intersection, target: only, ratio: 1}
  - {at: 1500, type: click, target: missing}
"#,
    )
    .unwrap();
    let compiled = trace.compile().unwrap();
    assert_eq!(compiled.skipped, 1);
    assert!(!compiled.ends_with_unload());

    let config = config();
    let transport = MemoryTransport::new();
    let handle = Collector::new(
        &config,
        compiled.page,
        Arc::new(transport.clone()),
        Arc::new(StaticIdentity::new(config.identity())),
    )
    .spawn();
    trace::play(&handle, compiled.events, 1.0).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;
    handle.finish().await.unwrap();

    let deliveries = transport.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].mode, DeliveryMode::Beacon);
    assert_eq!(deliveries[0].batch.elements[0].duration, 1_200);
}
