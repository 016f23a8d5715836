use std::collections::HashSet;

use serde::Deserialize;
use tracing::info;

use crate::db::TestStore;
use crate::error::{PollError, PollResult};

pub const NEED_CHOICE: &str = "Need to choose to vote!";

#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct VoteReceipt {
    pub id: i32,
    pub votes: i32,
    /// The client's ledger with this vote appended.
    pub ledger: Vec<i32>,
}

/// Counts one vote for `choice`, unless the ledger already holds a vote for
/// any choice of the same test.
pub async fn cast_vote(store: &dyn TestStore, choice: Option<&str>, mut ledger: Vec<i32>) -> PollResult<VoteReceipt> {
    let choice = match choice.map(str::trim) {
        None | Some("") => {
            info!("Rejected vote without a choice");
            return Err(PollError::Validation(NEED_CHOICE));
        }
        Some(v) => v,
    };

    let id = match choice.parse::<i32>() {
        Ok(v) => v,
        Err(_) => {
            info!(choice, "Rejected vote for a malformed choice id");
            return Err(PollError::NotFound);
        }
    };

    let choice = match store.get_choice(id).await? {
        None => {
            info!(choice_id = id, "Rejected vote for an unknown choice");
            return Err(PollError::NotFound);
        }
        Some(v) => v,
    };

    //

    let voted = ledger.iter().copied().collect::<HashSet<i32>>();
    let siblings = store.test_choice_ids(choice.id_test).await?;

    if siblings.iter().any(|id| voted.contains(id)) {
        info!(choice_id = id, test_id = choice.id_test, "Rejected repeat vote");
        return Err(PollError::Forbidden);
    }

    //

    let votes = match store.add_vote(id).await? {
        None => return Err(PollError::NotFound),
        Some(v) => v,
    };

    ledger.push(id);

    info!(choice_id = id, test_id = choice.id_test, votes, "Counted vote");

    Ok(VoteReceipt {
        id,
        votes,
        ledger,
    })
}
