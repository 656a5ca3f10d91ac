// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, BTreeSet};

use ::cid::Cid;
use futures::future::try_join_all;
use tracing::warn;

use crate::blocks::{BlockHeader, Tipset};
use crate::chain_source::{ChainSource, ChainSourceError, actors};
use crate::message::{Message, MessageExtended, ReceiptWithCid};
use crate::shim::address::Address;

/// Receipts produced while computing `tipset`'s parent state, paired with the
/// CIDs of their messages.
///
/// Every block of a tipset shares the parent, so the first block answers for
/// all of them.
pub async fn collect_receipts(
    source: &dyn ChainSource,
    tipset: &Tipset,
) -> Result<Vec<ReceiptWithCid>, ChainSourceError> {
    let Some(first) = tipset.cids().first() else {
        return Ok(vec![]);
    };
    let (messages, receipts) =
        tokio::try_join!(source.parent_messages(first), source.parent_receipts(first))?;
    if messages.len() != receipts.len() {
        warn!(
            height = tipset.epoch(),
            messages = messages.len(),
            receipts = receipts.len(),
            "parent messages and receipts disagree in length"
        );
    }
    Ok(messages
        .into_iter()
        .zip(receipts)
        .map(|(message, receipt)| ReceiptWithCid {
            cid: message.cid,
            receipt,
        })
        .collect())
}

/// Messages included by the blocks of `tipset`, one per CID, with the set of
/// blocks that included each.
pub async fn collect_messages(
    source: &dyn ChainSource,
    tipset: &Tipset,
) -> Result<Vec<MessageExtended>, ChainSourceError> {
    let per_block = try_join_all(tipset.block_headers().iter().map(|header| async move {
        source
            .block_messages(header.cid())
            .await
            .map(|messages| (header, messages))
    }))
    .await?;

    let mut observed: BTreeMap<Cid, (Message, &BlockHeader, BTreeSet<Cid>)> = BTreeMap::new();
    for (header, block_messages) in per_block {
        for (cid, message) in block_messages.messages {
            observed
                .entry(cid)
                .or_insert_with(|| (message, header, BTreeSet::new()))
                .2
                .insert(*header.cid());
        }
    }

    let mut extended = Vec::with_capacity(observed.len());
    for (cid, (message, header, block_cids)) in observed {
        let (from_id, to_id) = tokio::join!(
            source.resolve_id(&message.from, tipset.key()),
            source.resolve_id(&message.to, tipset.key())
        );
        let (from_type, to_type) = tokio::join!(
            actor_type(source, tipset, from_id.as_ref()),
            actor_type(source, tipset, to_id.as_ref())
        );
        let method_name = actors::method_name(&to_type, message.method_num)
            .map(str::to_owned)
            .unwrap_or_else(|| message.method_num.to_string());
        extended.push(MessageExtended {
            cid,
            height: tipset.epoch(),
            block_cids,
            from_id,
            to_id,
            from_type: actors::human_name(&from_type).to_owned(),
            to_type: actors::human_name(&to_type).to_owned(),
            method_name,
            timestamp: header.timestamp,
            parent_base_fee: header.parent_base_fee.clone(),
            message,
        });
    }
    Ok(extended)
}

async fn actor_type(source: &dyn ChainSource, tipset: &Tipset, id: Option<&Address>) -> String {
    match id {
        Some(id) => source
            .actor_type(id, tipset.key())
            .await
            .unwrap_or_else(|| actors::UNKNOWN.to_owned()),
        None => actors::UNKNOWN.to_owned(),
    }
}
