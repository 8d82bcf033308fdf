//! Layer 7: Wire envelope and blob classification
//!
//! Every schema blob is a JSON object with a `type` discriminator and a
//! shared set of envelope fields. Classification turns raw bytes into a
//! typed [`Node`] or a rejection reason; it never touches indexer state.

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::acl::{AclDelta, PermAction, PermissionBits};
use super::error::ClassifyError;
use super::identity::{BlobRef, UserId};
use super::limits::Limits;
use super::node::{KeepNode, MutationNode, Node, NodeHeader, Operation, PermaNode, PermissionNode};

/// Mimetype of schema blobs. Anything else passes through unindexed.
pub const SCHEMA_MIMETYPE: &str = "application/x-lightwave-schema";

const OCTET_STREAM: &str = "application/octet-stream";

/// Cheap mimetype sniff: schema blobs are JSON objects, so the first
/// non-whitespace byte decides. Malformed JSON behind a `{` is caught by
/// classification, not here.
pub fn sniff_mimetype(bytes: &[u8]) -> &'static str {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => SCHEMA_MIMETYPE,
        _ => OCTET_STREAM,
    }
}

/// Superset envelope over all four blob kinds. Field names are the wire
/// interface; kind-specific validation happens in [`classify`].
#[derive(Debug, Deserialize)]
struct SchemaEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "t")]
    time: Option<String>,
    #[serde(default)]
    signer: String,
    #[serde(rename = "perma")]
    perma: Option<String>,
    #[serde(rename = "dep", default)]
    dependencies: Vec<String>,
    // permanode
    #[serde(rename = "random")]
    _random: Option<String>,
    // mutation
    #[serde(rename = "op")]
    operation: Option<serde_json::Value>,
    site: Option<String>,
    // permission
    user: Option<String>,
    #[serde(default)]
    allow: u32,
    #[serde(default)]
    deny: u32,
    action: Option<String>,
    // keep
    permission: Option<String>,
}

/// Parse and validate a schema blob into a typed node.
///
/// `now` supplies the timestamp for blobs without a `t` field; a present
/// but malformed `t` rejects the blob. Oversized blobs and dependency lists
/// are rejected before JSON parsing does any real work.
pub fn classify(
    bytes: &[u8],
    blobref: &BlobRef,
    limits: &Limits,
    now: i64,
) -> Result<Node, ClassifyError> {
    if bytes.len() > limits.max_blob_bytes {
        return Err(ClassifyError::OversizeBlob {
            got: bytes.len(),
            max: limits.max_blob_bytes,
        });
    }

    let envelope: SchemaEnvelope = serde_json::from_slice(bytes)?;

    if envelope.signer.is_empty() {
        return Err(ClassifyError::MissingSigner);
    }
    let signer = UserId::parse(envelope.signer).map_err(into_classify)?;

    let timestamp = match envelope.time {
        None => now,
        Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339)
            .map(|dt| dt.unix_timestamp())
            .map_err(|err| ClassifyError::MalformedTimestamp {
                raw,
                reason: err.to_string(),
            })?,
    };

    if envelope.dependencies.len() > limits.max_dependencies {
        return Err(ClassifyError::TooManyDependencies {
            got: envelope.dependencies.len(),
            max: limits.max_dependencies,
        });
    }
    let mut dependencies = Vec::with_capacity(envelope.dependencies.len());
    for dep in envelope.dependencies {
        dependencies.push(BlobRef::new(dep).map_err(into_classify)?);
    }

    let parent = match envelope.perma {
        Some(raw) if !raw.is_empty() => Some(BlobRef::new(raw).map_err(into_classify)?),
        _ => None,
    };

    let header = NodeHeader {
        blobref: blobref.clone(),
        signer,
        timestamp,
        parent,
    };

    match envelope.kind.as_str() {
        "permanode" => Ok(Node::Perma(PermaNode::new(header))),
        "mutation" => {
            let Some(operation) = envelope.operation else {
                return Err(ClassifyError::MissingOperation);
            };
            let site = match envelope.site {
                Some(site) if !site.is_empty() => site,
                _ => return Err(ClassifyError::MissingSite),
            };
            Ok(Node::Mutation(MutationNode {
                header,
                operation: Operation(operation),
                site,
                dependencies,
            }))
        }
        "permission" => {
            let user = match envelope.user {
                Some(user) if !user.is_empty() => UserId::parse(user).map_err(into_classify)?,
                _ => return Err(ClassifyError::MissingUser),
            };
            let action = PermAction::parse(envelope.action.as_deref().unwrap_or(""))?;
            Ok(Node::Permission(PermissionNode {
                header,
                user,
                delta: AclDelta::new(PermissionBits(envelope.allow), PermissionBits(envelope.deny)),
                action,
                dependencies,
            }))
        }
        "keep" => {
            let permission = match envelope.permission {
                Some(raw) if !raw.is_empty() => Some(BlobRef::new(raw).map_err(into_classify)?),
                _ => None,
            };
            Ok(Node::Keep(KeepNode {
                header,
                permission,
                dependencies,
            }))
        }
        other => Err(ClassifyError::UnknownType {
            raw: other.to_string(),
        }),
    }
}

fn into_classify(err: crate::core::error::CoreError) -> ClassifyError {
    match err {
        crate::core::error::CoreError::InvalidId(id) => ClassifyError::InvalidId(id),
        other => ClassifyError::UnknownType {
            raw: other.to_string(),
        },
    }
}
