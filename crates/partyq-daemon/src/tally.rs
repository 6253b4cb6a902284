//! Vote tally engine.
//!
//! Each session keeps a [`VoteLedger`]: song URI to the ordered set of users
//! voting for it, in the order URIs were first voted for. Ranking sorts by vote
//! count and falls back to that insertion order on ties. The tally cycle pops
//! the top entry every period.

use partyq_types::{RankedSong, ServerEvent, SongInfo};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::session::SessionCode;
use crate::sink::EventSink;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteEntry {
    /// Each user at most once, in voting order
    pub voters: Vec<String>,
    pub name: String,
    pub artists: String,
    pub image: String,
}

impl VoteEntry {
    fn from_song(song: &SongInfo) -> Self {
        Self {
            voters: Vec::new(),
            name: song.name.clone(),
            artists: song.artist.clone(),
            image: song.image.clone(),
        }
    }

    fn ranked(&self, uri: &str) -> RankedSong {
        RankedSong {
            uri: uri.to_string(),
            votes: self.voters.clone(),
            name: self.name.clone(),
            artists: self.artists.clone(),
            image: self.image.clone(),
        }
    }
}

impl Serialize for VoteEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("VoteEntry", 4)?;
        s.serialize_field("votes", &self.voters)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("artists", &self.artists)?;
        s.serialize_field("image", &self.image)?;
        s.end()
    }
}

/// Insertion-ordered map from song URI to its votes.
///
/// Entries with no voters are removed, so every entry holds at least one vote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteLedger {
    entries: Vec<(String, VoteEntry)>,
}

impl VoteLedger {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&VoteEntry> {
        self.entries.iter().find(|(u, _)| u == uri).map(|(_, e)| e)
    }

    /// Toggle `user_id`'s vote for `song.uri`. Returns true if the vote is now cast.
    ///
    /// Metadata is taken from the first vote for a URI.
    pub fn toggle(&mut self, user_id: &str, song: &SongInfo) -> bool {
        let idx = match self.entries.iter().position(|(u, _)| *u == song.uri) {
            Some(idx) => idx,
            None => {
                self.entries
                    .push((song.uri.clone(), VoteEntry::from_song(song)));
                self.entries.len() - 1
            }
        };

        let voters = &mut self.entries[idx].1.voters;
        if let Some(pos) = voters.iter().position(|v| v == user_id) {
            voters.remove(pos);
            if voters.is_empty() {
                self.entries.remove(idx);
            }
            false
        } else {
            voters.push(user_id.to_string());
            true
        }
    }

    /// Entries by vote count descending, ties in insertion order.
    #[must_use]
    pub fn rank(&self) -> Vec<RankedSong> {
        let mut ranked: Vec<RankedSong> =
            self.entries.iter().map(|(uri, e)| e.ranked(uri)).collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.votes.len().cmp(&a.votes.len()));
        ranked
    }

    pub fn remove(&mut self, uri: &str) -> Option<VoteEntry> {
        let idx = self.entries.iter().position(|(u, _)| u == uri)?;
        Some(self.entries.remove(idx).1)
    }

    /// A URI picked uniformly among those tied for the most votes.
    pub fn top_by_raw_count(&self, rng: &mut impl Rng) -> Option<&str> {
        let max = self.entries.iter().map(|(_, e)| e.voters.len()).max()?;
        let tied: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, e)| e.voters.len() == max)
            .map(|(u, _)| u.as_str())
            .collect();
        tied.choose(rng).copied()
    }
}

impl Serialize for VoteLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(u, e)| (u, e)))
    }
}

/// Toggle a vote and broadcast the new ranking.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn cast_vote(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
    song: &SongInfo,
) -> Result<bool> {
    let session = registry.require_mut(code)?;
    let voted = session.ledger.toggle(user_id, song);
    debug!(%code, user_id, uri = %song.uri, voted, "Vote toggled");

    let votes = session.ledger.rank();
    sink.to_group(code, ServerEvent::UpdateVoteList { votes });
    Ok(voted)
}

/// Current ranking of a session's ledger.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn rank(registry: &SessionRegistry, code: SessionCode) -> Result<Vec<RankedSong>> {
    Ok(registry.require(code)?.ledger.rank())
}

/// One tally cycle: announce and remove the top song, then broadcast the rest.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn advance(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
) -> Result<Option<RankedSong>> {
    let session = registry.require_mut(code)?;
    let mut ranked = session.ledger.rank();

    if ranked.is_empty() {
        sink.to_group(code, ServerEvent::SongVoted { song_info: None });
        sink.to_group(code, ServerEvent::UpdateVoteList { votes: Vec::new() });
        return Ok(None);
    }

    let top = ranked.remove(0);
    session.ledger.remove(&top.uri);
    debug!(%code, uri = %top.uri, votes = top.votes.len(), "Tally picked song");

    sink.to_group(
        code,
        ServerEvent::SongVoted {
            song_info: Some(top.clone()),
        },
    );
    sink.to_group(code, ServerEvent::UpdateVoteList { votes: ranked });
    Ok(Some(top))
}

/// Host query for the current raw-count leader. Leaves the ledger untouched.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn top_by_raw_count(
    registry: &SessionRegistry,
    code: SessionCode,
    rng: &mut impl Rng,
) -> Result<Option<String>> {
    Ok(registry
        .require(code)?
        .ledger
        .top_by_raw_count(rng)
        .map(str::to_string))
}
