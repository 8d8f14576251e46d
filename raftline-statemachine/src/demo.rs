use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use raftline_core::{Command, CommandResult, CommandType, RaftlineError, Result, StateMachine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A minimal in-memory back end implementing the command vocabulary from
/// sufficient for local runs and tests. The real back end is an
/// external collaborator; this is not a durability claim.
#[derive(Default)]
pub struct InMemoryStateMachine {
    state: RwLock<AuctionState>,
}

#[derive(Default)]
struct AuctionState {
    users: HashMap<String, String>,
    auctions: HashMap<u64, Auction>,
}

struct Auction {
    owner: String,
    title: String,
    closed: bool,
    highest_bid: Option<(String, u64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuctionPayload {
    pub auction_id: u64,
    pub owner: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseAuctionPayload {
    pub auction_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBidPayload {
    pub auction_id: u64,
    pub bidder: String,
    pub amount: u64,
}

fn decode<T: for<'de> Deserialize<'de>>(payload: &Bytes) -> Result<T> {
    bincode::deserialize(payload).map_err(|e| RaftlineError::SerializationError(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    bincode::serialize(value)
        .map(Bytes::from)
        .map_err(|e| RaftlineError::SerializationError(e.to_string()))
}

impl InMemoryStateMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateMachine for InMemoryStateMachine {
    async fn apply(&self, command: &Command) -> Result<CommandResult> {
        match command.command_type {
            CommandType::NewUser => {
                let payload: NewUserPayload = decode(&command.payload)?;
                self.state
                    .write()
                    .users
                    .insert(payload.username, payload.password);
                Ok(CommandResult::None)
            }
            CommandType::NewAuction => {
                let payload: NewAuctionPayload = decode(&command.payload)?;
                self.state.write().auctions.insert(
                    payload.auction_id,
                    Auction {
                        owner: payload.owner,
                        title: payload.title,
                        closed: false,
                        highest_bid: None,
                    },
                );
                Ok(CommandResult::None)
            }
            CommandType::CloseAuction => {
                let payload: CloseAuctionPayload = decode(&command.payload)?;
                let mut state = self.state.write();
                let auction = state
                    .auctions
                    .get_mut(&payload.auction_id)
                    .ok_or_else(|| RaftlineError::InvalidRequest("unknown auction".into()))?;
                auction.closed = true;
                let winner = auction.highest_bid.clone();
                encode(&winner).map(CommandResult::Value)
            }
            CommandType::NewBid => {
                let payload: NewBidPayload = decode(&command.payload)?;
                let mut state = self.state.write();
                let auction = state
                    .auctions
                    .get_mut(&payload.auction_id)
                    .ok_or_else(|| RaftlineError::InvalidRequest("unknown auction".into()))?;
                if auction.closed {
                    return Err(RaftlineError::InvalidRequest("auction closed".into()));
                }
                let accepted = auction
                    .highest_bid
                    .as_ref()
                    .map(|(_, amount)| payload.amount > *amount)
                    .unwrap_or(true);
                if accepted {
                    auction.highest_bid = Some((payload.bidder, payload.amount));
                }
                encode(&accepted).map(CommandResult::Value)
            }
        }
    }
}
