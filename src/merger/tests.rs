//! Merger tests against a mocked provider.

use super::*;
use crate::credentials::Credentials;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const HOST: &str = "home.example.org";
const FQDN: &str = "home.example.org.";

/// Hands out a prepared mock API and counts connections.
struct MockConnector {
    api: Mutex<Option<MockZoneApi>>,
    connects: AtomicUsize,
}

impl MockConnector {
    fn new(api: MockZoneApi) -> Arc<Self> {
        Arc::new(Self {
            api: Mutex::new(Some(api)),
            connects: AtomicUsize::new(0),
        })
    }

    fn unused() -> Arc<Self> {
        Arc::new(Self {
            api: Mutex::new(None),
            connects: AtomicUsize::new(0),
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _credentials: &dyn Credentials) -> Result<Box<dyn ZoneApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let api = self
            .api
            .lock()
            .unwrap()
            .take()
            .expect("connected more than once");
        Ok(Box::new(api))
    }
}

fn credentials() -> Arc<dyn Credentials> {
    Arc::new(HashMap::<String, String>::new())
}

fn zone(id: &str, name: &str) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn record_set(name: &str, record_type: RecordType, values: &[&str]) -> RecordSet {
    RecordSet {
        name: name.to_string(),
        record_type,
        ttl: Some(300),
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

fn single_zone_api(record_sets: Vec<RecordSet>) -> MockZoneApi {
    let mut api = MockZoneApi::new();
    api.expect_list_zones().returning(|_| {
        Ok(ZonePage {
            zones: vec![zone("Z1", "example.org.")],
            next_marker: None,
        })
    });
    api.expect_list_record_sets()
        .withf(|zone_id, cursor| zone_id == "Z1" && cursor.name == FQDN)
        .returning(move |_, _| {
            Ok(RecordSetPage {
                record_sets: record_sets.clone(),
                next: None,
            })
        });
    api
}

#[tokio::test]
async fn test_skips_family_without_existing_record() {
    let mut api = single_zone_api(vec![record_set(FQDN, RecordType::A, &["1.1.1.1"])]);
    api.expect_submit_changes()
        .times(1)
        .withf(|zone_id, changes| {
            zone_id == "Z1"
                && changes.len() == 1
                && changes[0].record_type == RecordType::A
                && changes[0].value == "1.2.3.4"
                && changes[0].ttl == Some(300)
        })
        .returning(|_, _| {
            Ok(ChangeInfo {
                id: "C1".to_string(),
                status: "PENDING".to_string(),
            })
        });
    let connector = MockConnector::new(api);

    let mut merger = DnsMerger::new(connector.clone())
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));
    merger.merge_ipv6(Some("1:2:3:4::f".parse().unwrap()));
    let outcome = merger.commit(false).await.unwrap();

    match outcome {
        CommitOutcome::Applied {
            changes,
            change_info,
        } => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].name, FQDN);
            assert_eq!(change_info.id, "C1");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_both_families_in_one_batch() {
    let mut api = single_zone_api(vec![
        record_set(FQDN, RecordType::A, &["1.1.1.1"]),
        record_set(FQDN, RecordType::Aaaa, &["1:2:3:4::1"]),
        record_set(FQDN, RecordType::Other("TXT".to_string()), &["\"hello\""]),
    ]);
    api.expect_submit_changes()
        .times(1)
        .withf(|_, changes| changes.len() == 2)
        .returning(|_, _| {
            Ok(ChangeInfo {
                id: "C2".to_string(),
                status: "INSYNC".to_string(),
            })
        });

    let mut merger = DnsMerger::new(MockConnector::new(api))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));
    merger.merge_ipv6(Some("1:2:3:4::f".parse().unwrap()));

    assert!(matches!(
        merger.commit(false).await.unwrap(),
        CommitOutcome::Applied { changes, .. } if changes.len() == 2
    ));
}

#[tokio::test]
async fn test_pretend_never_submits() {
    let mut api = single_zone_api(vec![record_set(FQDN, RecordType::A, &["1.1.1.1"])]);
    api.expect_submit_changes().never();

    let mut merger = DnsMerger::new(MockConnector::new(api))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));

    match merger.commit(true).await.unwrap() {
        CommitOutcome::Pretended(changes) => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].to_string(), "home.example.org. A 1.2.3.4");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_nothing_buffered_never_connects() {
    let connector = MockConnector::unused();

    let merger = DnsMerger::new(connector.clone())
        .prepare(credentials(), HOST)
        .unwrap();

    assert_eq!(merger.commit(false).await.unwrap(), CommitOutcome::Unchanged);
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_non_singular_record_set_is_ignored() {
    let mut api = single_zone_api(vec![record_set(
        FQDN,
        RecordType::A,
        &["1.1.1.1", "2.2.2.2"],
    )]);
    api.expect_submit_changes().never();

    let mut merger = DnsMerger::new(MockConnector::new(api))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));

    assert_eq!(merger.commit(false).await.unwrap(), CommitOutcome::Unchanged);
}

#[tokio::test]
async fn test_no_matching_zone_is_not_found() {
    let mut api = MockZoneApi::new();
    api.expect_list_zones().returning(|_| {
        Ok(ZonePage {
            zones: vec![zone("Z9", "example.com.")],
            next_marker: None,
        })
    });
    api.expect_list_record_sets().never();

    let mut merger = DnsMerger::new(MockConnector::new(api))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));

    assert!(matches!(
        merger.commit(false).await,
        Err(DdnsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_provider_error_aborts() {
    let mut api = single_zone_api(vec![record_set(FQDN, RecordType::A, &["1.1.1.1"])]);
    api.expect_submit_changes()
        .returning(|_, _| Err(DdnsError::Provider("throttled".to_string())));

    let mut merger = DnsMerger::new(MockConnector::new(api))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv4(Some("1.2.3.4".parse().unwrap()));

    assert!(matches!(
        merger.commit(false).await,
        Err(DdnsError::Provider(msg)) if msg == "throttled"
    ));
}

#[tokio::test]
async fn test_missing_credentials_fail_before_lookup() {
    let mut merger = DnsMerger::new(Arc::new(Route53Connector::default()))
        .prepare(credentials(), HOST)
        .unwrap();
    merger.merge_ipv6(Some("::1".parse().unwrap()));

    assert!(matches!(
        merger.commit(false).await,
        Err(DdnsError::Config(msg)) if msg.contains("route53.accessKeyId")
    ));
}

#[test]
fn test_prepare_normalizes_host() {
    let merger = DnsMerger::new(MockConnector::unused())
        .prepare(credentials(), " Home.Example.ORG. ")
        .unwrap();
    assert_eq!(merger.host(), FQDN);
}

#[test]
fn test_normalize_host_folds_spellings() {
    assert_eq!(normalize_host("Home.Example.org."), "home.example.org");
    assert_eq!(normalize_host(" home.example.org "), "home.example.org");
    assert_eq!(normalize_host("."), "");
}

#[test]
fn test_prepare_rejects_empty_host() {
    let result = DnsMerger::new(MockConnector::unused()).prepare(credentials(), " . ");
    assert!(matches!(result, Err(DdnsError::Usage(_))));
}

#[tokio::test]
async fn test_more_specific_zone_wins_regardless_of_order() {
    for zones in [
        vec![zone("ZA", "a.tld."), zone("ZSUB", "sub.a.tld.")],
        vec![zone("ZSUB", "sub.a.tld."), zone("ZA", "a.tld.")],
    ] {
        let mut api = MockZoneApi::new();
        api.expect_list_zones().returning(move |_| {
            Ok(ZonePage {
                zones: zones.clone(),
                next_marker: None,
            })
        });

        let found = lookup_zone(&api, "x.sub.a.tld.").await.unwrap();
        assert_eq!(found.id, "ZSUB");
    }
}

#[tokio::test]
async fn test_zone_lookup_pages_through_listing() {
    let mut api = MockZoneApi::new();
    api.expect_list_zones()
        .withf(|marker| marker.is_none())
        .times(1)
        .returning(|_| {
            Ok(ZonePage {
                zones: vec![zone("ZA", "a.tld."), zone("ZX", "other.tld.")],
                next_marker: Some("page-2".to_string()),
            })
        });
    api.expect_list_zones()
        .withf(|marker| marker.as_deref() == Some("page-2"))
        .times(1)
        .returning(|_| {
            Ok(ZonePage {
                zones: vec![zone("ZSUB", "sub.a.tld.")],
                next_marker: None,
            })
        });

    let found = lookup_zone(&api, "x.sub.a.tld.").await.unwrap();
    assert_eq!(found.id, "ZSUB");
}

#[tokio::test]
async fn test_zone_name_is_proper_suffix() {
    let mut api = MockZoneApi::new();
    api.expect_list_zones().returning(|_| {
        Ok(ZonePage {
            zones: vec![zone("Z1", "ample.org."), zone("Z2", "example.org.")],
            next_marker: None,
        })
    });

    assert!(matches!(
        lookup_zone(&api, "example.org.").await,
        Err(DdnsError::NotFound(_))
    ));
    assert_eq!(lookup_zone(&api, "a.example.org.").await.unwrap().id, "Z2");
}

#[tokio::test]
async fn test_record_lookup_follows_cursor_until_host_passed() {
    let mut api = MockZoneApi::new();
    api.expect_list_record_sets()
        .withf(|_, cursor| cursor.record_type.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(RecordSetPage {
                record_sets: vec![record_set(FQDN, RecordType::A, &["1.1.1.1"])],
                next: Some(RecordSetCursor {
                    name: FQDN.to_string(),
                    record_type: Some("AAAA".to_string()),
                    identifier: None,
                }),
            })
        });
    api.expect_list_record_sets()
        .withf(|_, cursor| cursor.record_type.as_deref() == Some("AAAA"))
        .times(1)
        .returning(|_, _| {
            Ok(RecordSetPage {
                record_sets: vec![
                    record_set(FQDN, RecordType::Aaaa, &["::1"]),
                    record_set("www.example.org.", RecordType::A, &["9.9.9.9"]),
                ],
                next: Some(RecordSetCursor::start("www.example.org.")),
            })
        });

    let found = lookup_record_sets(&api, &zone("Z1", "example.org."), FQDN)
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[&RecordType::A].values, vec!["1.1.1.1"]);
    assert_eq!(found[&RecordType::Aaaa].values, vec!["::1"]);
}
