//! AWS Route53 backend.

use super::{
    Change, ChangeInfo, Connector, RecordSet, RecordSetCursor, RecordSetPage, RecordType, Zone,
    ZoneApi, ZonePage,
};
use crate::credentials::{
    Credentials, KEY_ROUTE53_ACCESS_KEY_ID, KEY_ROUTE53_REGION, KEY_ROUTE53_SECRET_ACCESS_KEY,
};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use aws_sdk_route53::config::{BehaviorVersion, Credentials as AwsCredentials, Region};
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    Change as AwsChange, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;

const PROVIDER_NAME: &str = "ddns-updater";

/// Builds Route53 clients from static credentials.
#[derive(Debug, Clone)]
pub struct Route53Connector {
    region: String,
}

impl Route53Connector {
    /// Create a connector signing for `region` unless the credentials name one.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Default for Route53Connector {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl Connector for Route53Connector {
    fn connect(&self, credentials: &dyn Credentials) -> Result<Box<dyn ZoneApi>> {
        let access_key_id = require(credentials, KEY_ROUTE53_ACCESS_KEY_ID)?;
        let secret_access_key = require(credentials, KEY_ROUTE53_SECRET_ACCESS_KEY)?;
        let region = credentials
            .get_credential(KEY_ROUTE53_REGION)
            .unwrap_or_else(|| self.region.clone());

        let config = aws_sdk_route53::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(AwsCredentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                PROVIDER_NAME,
            ))
            .build();

        Ok(Box::new(Route53Api {
            client: Client::from_conf(config),
        }))
    }
}

fn require(credentials: &dyn Credentials, key: &str) -> Result<String> {
    credentials
        .get_credential(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DdnsError::Config(format!("Missing credential: {}", key)))
}

fn provider_error<E: std::error::Error>(err: E) -> DdnsError {
    DdnsError::Provider(DisplayErrorContext(err).to_string())
}

/// Route53 API session.
struct Route53Api {
    client: Client,
}

#[async_trait]
impl ZoneApi for Route53Api {
    async fn list_zones(&self, marker: Option<String>) -> Result<ZonePage> {
        let output = self
            .client
            .list_hosted_zones()
            .set_marker(marker)
            .send()
            .await
            .map_err(provider_error)?;

        let zones = output
            .hosted_zones()
            .iter()
            .map(|zone| Zone {
                id: zone.id().to_string(),
                name: zone.name().to_string(),
            })
            .collect();
        let next_marker = if output.is_truncated() {
            output.next_marker().map(str::to_string)
        } else {
            None
        };

        Ok(ZonePage { zones, next_marker })
    }

    async fn list_record_sets(
        &self,
        zone_id: String,
        cursor: RecordSetCursor,
    ) -> Result<RecordSetPage> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(cursor.name)
            .set_start_record_type(cursor.record_type.as_deref().map(RrType::from))
            .set_start_record_identifier(cursor.identifier)
            .send()
            .await
            .map_err(provider_error)?;

        let record_sets = output
            .resource_record_sets()
            .iter()
            .map(|set| RecordSet {
                name: set.name().to_string(),
                record_type: RecordType::from(set.r#type().as_str()),
                ttl: set.ttl(),
                values: set
                    .resource_records()
                    .iter()
                    .map(|record| record.value().to_string())
                    .collect(),
            })
            .collect();
        let next = if output.is_truncated() {
            output.next_record_name().map(|name| RecordSetCursor {
                name: name.to_string(),
                record_type: output.next_record_type().map(|t| t.as_str().to_string()),
                identifier: output.next_record_identifier().map(str::to_string),
            })
        } else {
            None
        };

        Ok(RecordSetPage { record_sets, next })
    }

    async fn submit_changes(&self, zone_id: String, changes: Vec<Change>) -> Result<ChangeInfo> {
        let changes = changes
            .into_iter()
            .map(to_aws_change)
            .collect::<Result<Vec<_>>>()?;
        let batch = ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(provider_error)?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(provider_error)?;

        let info = output
            .change_info()
            .ok_or_else(|| DdnsError::Provider("Change response without change info".into()))?;

        Ok(ChangeInfo {
            id: info.id().to_string(),
            status: info.status().as_str().to_string(),
        })
    }
}

fn to_aws_change(change: Change) -> Result<AwsChange> {
    let record = ResourceRecord::builder()
        .value(change.value)
        .build()
        .map_err(provider_error)?;
    let record_set = ResourceRecordSet::builder()
        .name(change.name)
        .r#type(RrType::from(change.record_type.as_str()))
        .set_ttl(change.ttl)
        .resource_records(record)
        .build()
        .map_err(provider_error)?;

    AwsChange::builder()
        .action(ChangeAction::Upsert)
        .resource_record_set(record_set)
        .build()
        .map_err(provider_error)
}
