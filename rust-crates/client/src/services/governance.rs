use super::{
    ModuleClient,
    ensure_id,
};
use crate::{
    encoding::MoveArg,
    error::{
        ClientError,
        Result,
    },
    model::Proposal,
    normalize::{
        Row,
        Schema,
        map_rows,
        or_empty,
    },
    proposal::{
        ProposalArgs,
        decode_payload,
        encode_payload,
    },
    transport::{
        Transport,
        TxHash,
    },
};
use tracing::debug;

pub const MODULE: &str = "governance";

pub static PROPOSALS: Schema = Schema {
    name: "proposals",
    columns: &[
        "id",
        "country_id",
        "proposer",
        "proposal_type",
        "payload",
        "yes_votes",
        "no_votes",
        "executed",
        "created_at",
    ],
};

/// Payloads of unknown types are kept as bytes with no decoded form.
pub fn map_proposal(row: &Row) -> Proposal {
    let id = row.u64(&["id", "proposal_id"]);
    let proposal_type = row.u8(&["proposal_type", "type", "kind"]);
    let payload = row.bytes(&["payload", "args", "data"]);
    let args = match decode_payload(proposal_type, &payload) {
        Ok(args) => Some(args),
        Err(e) => {
            debug!(proposal = id, proposal_type, "payload not decoded: {e}");
            None
        }
    };
    Proposal {
        id,
        country_id: row.u64(&["country_id", "country"]),
        proposer: row.address(&["proposer", "author"]),
        proposal_type,
        payload,
        args,
        yes_votes: row.u64(&["yes_votes", "votes_for", "yes"]),
        no_votes: row.u64(&["no_votes", "votes_against", "no"]),
        executed: row.bool(&["executed", "is_executed"]),
        created_at: row.u64(&["created_at", "timestamp"]),
    }
}

/// Checks a new proposal and encodes its payload.
pub fn proposal_payload(country_id: u64, args: &ProposalArgs) -> Result<Vec<u8>> {
    ensure_id("country id", country_id)?;
    encode_payload(args).map_err(|e| ClientError::precondition(format!("invalid proposal: {e}")))
}

#[derive(Clone, Debug)]
pub struct GovernanceService<T> {
    client: ModuleClient<T>,
}

impl<T: Transport> GovernanceService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: ModuleClient::new(transport, MODULE),
        }
    }

    pub async fn try_proposals(&self, country_id: u64) -> Result<Vec<Proposal>> {
        let raw = self
            .client
            .view("get_proposals", &[MoveArg::U64(country_id)])
            .await?;
        map_rows(&raw, &PROPOSALS, map_proposal)
    }

    pub async fn proposals(&self, country_id: u64) -> Vec<Proposal> {
        or_empty("governance::get_proposals", self.try_proposals(country_id).await)
    }

    pub async fn propose(&self, country_id: u64, args: &ProposalArgs) -> Result<TxHash> {
        let payload = proposal_payload(country_id, args)?;
        self.client
            .call(
                "create_proposal",
                vec![
                    MoveArg::U64(country_id),
                    MoveArg::U8(args.type_id()),
                    MoveArg::Bytes(payload),
                ],
            )
            .await
    }

    pub async fn vote(&self, proposal_id: u64, support: bool) -> Result<TxHash> {
        ensure_id("proposal id", proposal_id)?;
        self.client
            .call(
                "vote",
                vec![MoveArg::U64(proposal_id), MoveArg::Bool(support)],
            )
            .await
    }

    pub async fn execute(&self, proposal_id: u64) -> Result<TxHash> {
        ensure_id("proposal id", proposal_id)?;
        self.client
            .call("execute_proposal", vec![MoveArg::U64(proposal_id)])
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        address::AccountAddress,
        encoding::Decoder,
        test_helpers::{
            FakeLedger,
            FakeWallet,
        },
    };
    use serde_json::json;

    #[tokio::test]
    async fn proposals__decode_known_payloads() {
        // given
        let payload = encode_payload(&ProposalArgs::DeclareWar { target_country: 6 }).unwrap();
        let ledger = FakeLedger::new();
        ledger.set_view(
            MODULE,
            "get_proposals",
            json!([
                {
                    "id": 1,
                    "type": 3,
                    "payload": format!("0x{}", hex::encode(&payload)),
                    "votes_for": 4,
                    "votes_against": "1",
                },
                { "id": 2, "proposal_type": 99, "payload": [1, 2, 3], "executed": true },
            ]),
        );
        let service = GovernanceService::new(ledger);

        // when
        let proposals = service.proposals(1).await;

        // then
        assert_eq!(
            proposals[0].args,
            Some(ProposalArgs::DeclareWar { target_country: 6 })
        );
        assert!(proposals[0].passing());
        assert_eq!(proposals[1].args, None);
        assert_eq!(proposals[1].payload, vec![1, 2, 3]);
        assert!(!proposals[1].is_open());
    }

    #[test]
    fn map_proposal__is_idempotent_through_serialization() {
        // given
        let payload = encode_payload(&ProposalArgs::PrintMoney { amount: 10 }).unwrap();
        let raw = json!([{ "id": 3, "proposal_type": 5, "payload": payload }]);
        let first = map_rows(&raw, &PROPOSALS, map_proposal).unwrap();

        // when
        let again = map_rows(
            &serde_json::to_value(&first).unwrap(),
            &PROPOSALS,
            map_proposal,
        )
        .unwrap();

        // then
        assert_eq!(first, again);
        assert!(first[0].args.is_some());
    }

    #[tokio::test]
    async fn propose__sends_type_and_encoded_payload() {
        // given
        let wallet = FakeWallet::connected(AccountAddress::new([8; 32]));
        let service = GovernanceService::new(FakeLedger::with_wallet(wallet.clone()));
        let args = ProposalArgs::SetWelcomeMessage {
            message: "hi".to_string(),
        };

        // when
        service.propose(2, &args).await.unwrap();

        // then
        let descriptor = &wallet.descriptors()[0];
        assert_eq!(descriptor.function_name, "create_proposal");
        assert_eq!(descriptor.encoded_args[1], vec![7]);
        let mut decoder = Decoder::new(&descriptor.encoded_args[2]);
        let payload = decoder.read_bytes().unwrap();
        assert_eq!(decode_payload(7, &payload).unwrap(), args);
    }
}
