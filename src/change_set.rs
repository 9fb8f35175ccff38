//! Picking object ids out of a transaction's effects.
//!
//! A step that creates an object (a space, a proposal, a reward) hands its id
//! to the next step by way of the object changes of the submitted transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::TransactionSubmitter;
use crate::transaction::ProgrammableTransaction;
use crate::types::ObjectId;
use crate::walker::upstream;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Published,
    Created,
    Mutated,
    Deleted,
    Wrapped,
    Transferred,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Published => "published",
            ChangeKind::Created => "created",
            ChangeKind::Mutated => "mutated",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Wrapped => "wrapped",
            ChangeKind::Transferred => "transferred",
        };
        f.write_str(name)
    }
}

/// Entry of `objectChanges` in a transaction response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectChange {
    #[serde(rename_all = "camelCase")]
    Published {
        package_id: ObjectId,
        #[serde(default)]
        modules: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Created {
        object_type: String,
        object_id: ObjectId,
    },
    #[serde(rename_all = "camelCase")]
    Mutated {
        object_type: String,
        object_id: ObjectId,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        object_type: String,
        object_id: ObjectId,
    },
    #[serde(rename_all = "camelCase")]
    Wrapped {
        object_type: String,
        object_id: ObjectId,
    },
    #[serde(rename_all = "camelCase")]
    Transferred {
        object_type: String,
        object_id: ObjectId,
    },
}

impl ObjectChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ObjectChange::Published { .. } => ChangeKind::Published,
            ObjectChange::Created { .. } => ChangeKind::Created,
            ObjectChange::Mutated { .. } => ChangeKind::Mutated,
            ObjectChange::Deleted { .. } => ChangeKind::Deleted,
            ObjectChange::Wrapped { .. } => ChangeKind::Wrapped,
            ObjectChange::Transferred { .. } => ChangeKind::Transferred,
        }
    }

    /// `None` for packages.
    pub fn object_type(&self) -> Option<&str> {
        match self {
            ObjectChange::Published { .. } => None,
            ObjectChange::Created { object_type, .. }
            | ObjectChange::Mutated { object_type, .. }
            | ObjectChange::Deleted { object_type, .. }
            | ObjectChange::Wrapped { object_type, .. }
            | ObjectChange::Transferred { object_type, .. } => Some(object_type),
        }
    }

    /// Package id for `published`, object id otherwise.
    pub fn object_id(&self) -> ObjectId {
        match self {
            ObjectChange::Published { package_id, .. } => *package_id,
            ObjectChange::Created { object_id, .. }
            | ObjectChange::Mutated { object_id, .. }
            | ObjectChange::Deleted { object_id, .. }
            | ObjectChange::Wrapped { object_id, .. }
            | ObjectChange::Transferred { object_id, .. } => *object_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeMatch<'a> {
    /// Every change of the requested kind.
    Any,
    Suffix(&'a str),
    Contains(&'a str),
}

impl<'a> TypeMatch<'a> {
    fn matches(&self, object_type: Option<&str>) -> bool {
        match (self, object_type) {
            (TypeMatch::Any, _) => true,
            (TypeMatch::Suffix(suffix), Some(object_type)) => object_type.ends_with(suffix),
            (TypeMatch::Contains(part), Some(object_type)) => object_type.contains(part),
            (_, None) => false,
        }
    }
}

impl<'a> fmt::Display for TypeMatch<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMatch::Any => f.write_str("*"),
            TypeMatch::Suffix(suffix) => write!(f, "*{}", suffix),
            TypeMatch::Contains(part) => write!(f, "*{}*", part),
        }
    }
}

/// The id of the single change of `kind` whose type satisfies `matcher`.
pub fn extract_one(
    changes: &[ObjectChange],
    kind: ChangeKind,
    matcher: TypeMatch,
) -> Result<ObjectId> {
    let matching: Vec<&ObjectChange> = changes
        .iter()
        .filter(|change| change.kind() == kind && matcher.matches(change.object_type()))
        .collect();

    match matching.as_slice() {
        [single] => Ok(single.object_id()),
        [] => Err(Error::NotFound {
            kind,
            pattern: matcher.to_string(),
        }),
        many => Err(Error::AmbiguousMatch {
            kind,
            pattern: matcher.to_string(),
            count: many.len(),
        }),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
}

/// The parts of `sui_executeTransactionBlock`'s response the core reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub object_changes: Option<Vec<ObjectChange>>,
}

impl TransactionResponse {
    pub fn ensure_success(&self) -> Result<()> {
        match &self.effects {
            Some(effects) if effects.status.status == "success" => Ok(()),
            Some(effects) => Err(Error::ExecutionFailed {
                digest: self.digest.clone(),
                reason: effects
                    .status
                    .error
                    .clone()
                    .unwrap_or_else(|| effects.status.status.clone()),
            }),
            None => Err(Error::ExecutionFailed {
                digest: self.digest.clone(),
                reason: "response carries no effects".to_string(),
            }),
        }
    }

    pub fn object_changes(&self) -> &[ObjectChange] {
        self.object_changes.as_deref().unwrap_or(&[])
    }

    pub fn extract_one(&self, kind: ChangeKind, matcher: TypeMatch) -> Result<ObjectId> {
        extract_one(self.object_changes(), kind, matcher)
    }
}

/// Submits one step and returns the id it produced, together with the full
/// response for logging.
pub async fn submit_and_extract<S>(
    submitter: &S,
    tx: ProgrammableTransaction,
    kind: ChangeKind,
    matcher: TypeMatch<'_>,
) -> Result<(ObjectId, TransactionResponse)>
where
    S: TransactionSubmitter + ?Sized,
{
    let response = submitter.execute(tx).await.map_err(upstream)?;
    if let Err(err) = response.ensure_success() {
        tracing::warn!("transaction failed: {:?}", response);
        return Err(err);
    }
    let id = match response.extract_one(kind, matcher) {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(
                "can't resolve {} {} in {:?}",
                kind,
                matcher,
                response.object_changes()
            );
            return Err(err);
        }
    };
    tracing::info!("transaction {} {} {}", response.digest, kind, id);
    Ok((id, response))
}

#[cfg(test)]
mod tests {
    use crate::change_set::{
        extract_one, submit_and_extract, ChangeKind, ObjectChange, TransactionEffects,
        TransactionResponse, TypeMatch,
    };
    use crate::error::Error;
    use crate::ledger::mock::id;
    use crate::ledger::TransactionSubmitter;
    use crate::transaction::ProgrammableTransaction;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn created(n: u64, object_type: &str) -> ObjectChange {
        ObjectChange::Created {
            object_type: object_type.to_string(),
            object_id: id(n),
        }
    }

    #[test]
    fn single_match_by_substring() {
        let changes = vec![created(1, "pkg::mod::Foo"), created(2, "pkg::mod::Bar")];
        assert_eq!(
            extract_one(&changes, ChangeKind::Created, TypeMatch::Contains("Foo")).unwrap(),
            id(1)
        );
        assert!(matches!(
            extract_one(&changes, ChangeKind::Created, TypeMatch::Contains("Baz")),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            extract_one(&changes, ChangeKind::Created, TypeMatch::Contains("mod")),
            Err(Error::AmbiguousMatch { count: 2, .. })
        ));
    }

    #[test]
    fn suffix_and_kind_must_both_match() {
        let changes = vec![
            created(1, "0x1::movernance::SpaceStore"),
            ObjectChange::Mutated {
                object_type: "0x1::movernance::SpaceStore".to_string(),
                object_id: id(2),
            },
            created(3, "0x1::movernance::SpaceStoreCap"),
        ];
        assert_eq!(
            extract_one(
                &changes,
                ChangeKind::Created,
                TypeMatch::Suffix("::movernance::SpaceStore")
            )
            .unwrap(),
            id(1)
        );
        assert_eq!(
            extract_one(&changes, ChangeKind::Mutated, TypeMatch::Any).unwrap(),
            id(2)
        );
        assert!(matches!(
            extract_one(&changes, ChangeKind::Deleted, TypeMatch::Any),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn published_package_from_response() {
        let response: TransactionResponse = serde_json::from_str(
            r#"{
                "digest": "7Xh2",
                "effects": {"status": {"status": "success"}, "gasUsed": {}},
                "objectChanges": [
                    {"type": "published", "packageId": "0x4eab", "version": "1", "digest": "a", "modules": ["movernance", "test_nft"]},
                    {"type": "created", "sender": "0x1", "owner": {"Shared": {"initial_shared_version": 3}},
                     "objectType": "0x4eab::movernance::SpaceStore", "objectId": "0x56f0", "version": "3", "digest": "b"},
                    {"type": "mutated", "sender": "0x1", "owner": {"AddressOwner": "0x1"},
                     "objectType": "0x2::coin::Coin<0x2::sui::SUI>", "objectId": "0x99", "version": "3", "previousVersion": "2", "digest": "c"}
                ]
            }"#,
        )
        .unwrap();
        response.ensure_success().unwrap();
        let package = response
            .extract_one(ChangeKind::Published, TypeMatch::Any)
            .unwrap();
        assert_eq!(package.to_string(), format!("0x{:0>64}", "4eab"));
        let store = response
            .extract_one(ChangeKind::Created, TypeMatch::Suffix("::movernance::SpaceStore"))
            .unwrap();
        assert_eq!(store.to_string(), format!("0x{:0>64}", "56f0"));
        assert!(response
            .extract_one(ChangeKind::Published, TypeMatch::Contains("movernance"))
            .is_err());
    }

    #[test]
    fn failed_effects_are_rejected() {
        let response: TransactionResponse = serde_json::from_str(
            r#"{"digest": "9a", "effects": {"status": {"status": "failure", "error": "MoveAbort(3)"}}}"#,
        )
        .unwrap();
        match response.ensure_success() {
            Err(Error::ExecutionFailed { digest, reason }) => {
                assert_eq!(digest, "9a");
                assert_eq!(reason, "MoveAbort(3)");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(response.object_changes().is_empty());

        let bare: TransactionResponse = serde_json::from_str(r#"{"digest": "9b"}"#).unwrap();
        assert!(bare.ensure_success().is_err());
    }

    fn succeeded() -> Option<TransactionEffects> {
        serde_json::from_str(r#"{"status": {"status": "success"}}"#).unwrap()
    }

    struct Scripted {
        responses: Mutex<Vec<TransactionResponse>>,
        submitted: Mutex<Vec<ProgrammableTransaction>>,
    }

    #[async_trait]
    impl TransactionSubmitter for Scripted {
        async fn execute(
            &self,
            tx: ProgrammableTransaction,
        ) -> anyhow::Result<TransactionResponse> {
            self.submitted.lock().unwrap().push(tx);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no scripted response left"))
        }
    }

    #[tokio::test]
    async fn steps_are_chained_through_ids() {
        let submitter = Scripted {
            responses: Mutex::new(vec![
                TransactionResponse {
                    digest: "proposal".to_string(),
                    effects: succeeded(),
                    object_changes: Some(vec![created(20, "0x1::movernance::GovProposal<A, B>")]),
                },
                TransactionResponse {
                    digest: "space".to_string(),
                    effects: succeeded(),
                    object_changes: Some(vec![created(10, "0x1::movernance::GovSpace<A, B>")]),
                },
            ]),
            submitted: Mutex::new(vec![]),
        };

        let mut create_space = ProgrammableTransaction::new();
        create_space
            .move_call("0x1::movernance::create_space", vec![], vec![])
            .unwrap();
        let (space, _) = submit_and_extract(
            &submitter,
            create_space,
            ChangeKind::Created,
            TypeMatch::Contains("::movernance::GovSpace"),
        )
        .await
        .unwrap();
        assert_eq!(space, id(10));

        let mut create_proposal = ProgrammableTransaction::new();
        let space_arg = create_proposal.object(space).unwrap();
        create_proposal
            .move_call("0x1::movernance::create_proposal", vec![], vec![space_arg])
            .unwrap();
        let (proposal, response) = submit_and_extract(
            &submitter,
            create_proposal,
            ChangeKind::Created,
            TypeMatch::Contains("movernance::GovProposal"),
        )
        .await
        .unwrap();
        assert_eq!(proposal, id(20));
        assert_eq!(response.digest, "proposal");

        let submitted = submitter.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 2);
        assert_eq!(
            submitted[1].inputs(),
            vec![crate::transaction::CallArg::Object(id(10))]
        );
    }

    #[tokio::test]
    async fn submit_errors_are_upstream() {
        let submitter = Scripted {
            responses: Mutex::new(vec![]),
            submitted: Mutex::new(vec![]),
        };
        let result = submit_and_extract(
            &submitter,
            ProgrammableTransaction::new(),
            ChangeKind::Created,
            TypeMatch::Any,
        )
        .await;
        assert!(matches!(result, Err(Error::Upstream(_))));
    }
}
