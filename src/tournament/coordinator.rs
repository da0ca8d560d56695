//! Tournament Coordinator
//!
//! Top-level state machine. Owns every piece of tournament state and is the
//! only way to mutate it:
//!
//! ```text
//!   Registering ──ballot opened──▶ Voting ──quorum──▶ RoundInProgress
//!        ▲                                                  │
//!        │                                        last match resolved
//!        │                                                  ▼
//!        └───────────────trophy claimed──────────────── Finished
//! ```
//!
//! Callers wrap the coordinator in a single lock, so each operation's checks
//! and the mutation that follows are atomic. Rejected operations leave the
//! tournament untouched. Notifications for other participants are queued and
//! drained with [`TournamentCoordinator::take_notifications`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ArenaConfig;
use crate::core::rng::ArenaRng;
use crate::crypto::credential::{AnonId, Credential, CredentialIssuer};
use crate::crypto::zkp::{SchnorrProof, ZkpAuthenticator};
use crate::error::{ArenaError, ArenaResult};
use crate::tournament::bracket::{Bracket, BracketScheduler, RoundTransition};
use crate::tournament::engine::{CommitRevealMatchEngine, MatchResult, MoveReceipt, RevealOutcome};
use crate::tournament::events::{Event, Notification};
use crate::tournament::ledger::{AggregateProof, VictoryProofLedger};
use crate::tournament::rules::Variant;
use crate::tournament::voting::{ModeVotingService, VoteOutcome};

/// Display labels handed out at registration.
pub const ALIAS_POOL: [&str; 8] = [
    "🐴 Crazy Horse",
    "🐱 Flying Cat",
    "🐶 Brave Dog",
    "🐢 Ninja Turtle",
    "🦅 Royal Eagle",
    "🐵 Happy Monkey",
    "🦈 Angry Shark",
    "🦊 Clever Fox",
];

/// Longest alias accepted by [`TournamentCoordinator::set_alias`], in characters.
pub const MAX_ALIAS_LEN: usize = 32;

/// Static command listing.
pub const HELP_TEXT: &str = "\
register                 get an anonymous credential
authenticate_and_vote    prove your credential and open a ballot
vote <variant>           choose the rule variant (after authenticating)
submit_move <move>       commit to a move for your current match
reveal_move <move> <nonce>  open your commitment
status                   show the current bracket
claim_trophy             redeem your victory proofs
set_alias <name>         change your display name
help                     this listing";

/// Tournament phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Accepting registrations; no ballot opened yet.
    Registering,
    /// At least one ballot opened; waiting for the threshold.
    Voting,
    /// Bracket play under the selected variant.
    RoundInProgress,
    /// A champion has been decided; waiting for the trophy claim.
    Finished,
}

/// Reply to a successful registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Issued credential.
    pub credential: Credential,
    /// Assigned display label.
    pub alias: String,
}

/// Read-only view of the tournament, labelled by alias.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Current phase.
    pub state: TournamentState,
    /// Registered participants.
    pub registered: usize,
    /// Ballots cast in the current voting phase.
    pub votes: usize,
    /// Required quorum.
    pub quorum: usize,
    /// Selected variant, once voting has finished.
    pub variant: Option<String>,
    /// Current round number.
    pub round: Option<u32>,
    /// Unresolved matches as alias pairs.
    pub matches: Vec<(String, String)>,
    /// Alias of the bye holder.
    pub bye: Option<String>,
    /// Alias of the champion.
    pub champion: Option<String>,
}

/// Reply to a granted trophy claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrophyGrant {
    /// Proofs that recomputed correctly.
    pub valid_proofs: usize,
    /// Aggregate over all of the claimant's proofs.
    pub aggregate: Option<AggregateProof>,
}

/// Owns and sequences the whole tournament.
#[derive(Debug)]
pub struct TournamentCoordinator {
    issuer: CredentialIssuer,
    authenticator: ZkpAuthenticator,
    voting: ModeVotingService,
    engine: Option<CommitRevealMatchEngine>,
    ledger: VictoryProofLedger,
    state: TournamentState,
    champion: Option<AnonId>,
    open_ballots: BTreeSet<AnonId>,
    outbox: Vec<Notification>,
    rng: ArenaRng,
}

impl TournamentCoordinator {
    /// Fresh tournament from `config`, drawing all randomness from `rng`.
    pub fn new(config: &ArenaConfig, rng: ArenaRng) -> Self {
        Self {
            issuer: CredentialIssuer::new(config.issuer_secret.clone()),
            authenticator: ZkpAuthenticator::default(),
            voting: ModeVotingService::new(
                config.variants.clone(),
                config.min_players,
                config.tally_policy,
            ),
            engine: None,
            ledger: VictoryProofLedger::new(),
            state: TournamentState::Registering,
            champion: None,
            open_ballots: BTreeSet::new(),
            outbox: Vec::new(),
            rng,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current phase.
    pub fn state(&self) -> TournamentState {
        self.state
    }

    /// Credential issuer and participant table.
    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Victory proofs.
    pub fn ledger(&self) -> &VictoryProofLedger {
        &self.ledger
    }

    /// Voting service.
    pub fn voting(&self) -> &ModeVotingService {
        &self.voting
    }

    /// Match engine, present once a variant is selected.
    pub fn engine(&self) -> Option<&CommitRevealMatchEngine> {
        self.engine.as_ref()
    }

    /// Selected variant.
    pub fn variant(&self) -> Option<&Variant> {
        self.engine.as_ref().map(CommitRevealMatchEngine::variant)
    }

    /// Tournament winner, once finished.
    pub fn champion(&self) -> Option<&AnonId> {
        self.champion.as_ref()
    }

    /// Whether `anon_id` has an open ballot.
    pub fn has_open_ballot(&self, anon_id: &AnonId) -> bool {
        self.open_ballots.contains(anon_id)
    }

    /// Drain queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Command listing.
    pub fn help(&self) -> &'static str {
        HELP_TEXT
    }

    // =========================================================================
    // REGISTRATION & AUTHENTICATION
    // =========================================================================

    /// Issue a credential to `identity`.
    ///
    /// Registration is open in every phase; late registrants wait for the
    /// next tournament.
    pub fn register(&mut self, identity: &str) -> ArenaResult<Registration> {
        if self.issuer.participant(identity).is_ok() {
            return Err(ArenaError::AlreadyRegistered);
        }
        let alias = self.next_alias();
        let credential = self.issuer.register(identity, alias.clone(), &mut self.rng)?;
        info!("Registered {} as {}", credential.anon_id.short(), alias);
        Ok(Registration { credential, alias })
    }

    /// Check the credential of `identity` and a proof of knowledge of its
    /// authentication secret.
    pub fn verify_participant_proof(
        &self,
        identity: &str,
        proof: &SchnorrProof,
    ) -> ArenaResult<AnonId> {
        let participant = self.issuer.participant(identity)?;
        if !self.issuer.verify_credential(&participant.credential) {
            return Err(ArenaError::InvalidCredential);
        }
        if !self
            .authenticator
            .verify(proof, &participant.credential.public_key)
        {
            warn!("Proof rejected for {}", participant.anon_id().short());
            return Err(ArenaError::AuthenticationFailure);
        }
        Ok(participant.anon_id().clone())
    }

    /// Prove on behalf of `identity` with its stored secret, then verify.
    pub fn authenticate(&mut self, identity: &str) -> ArenaResult<AnonId> {
        let participant = self.issuer.participant(identity)?;
        let proof = self
            .authenticator
            .prove(participant.auth.secret(), &mut self.rng);
        self.verify_participant_proof(identity, &proof)
    }

    // =========================================================================
    // VOTING
    // =========================================================================

    /// Authenticate `identity` and open a ballot. Returns the variant names.
    pub fn authenticate_and_open_ballot(&mut self, identity: &str) -> ArenaResult<Vec<String>> {
        self.ensure_voting_open()?;
        let anon_id = self.authenticate(identity)?;

        self.open_ballots.insert(anon_id.clone());
        if self.state == TournamentState::Registering {
            self.state = TournamentState::Voting;
            info!("Voting opened");
        }

        Ok(self
            .voting
            .variants()
            .iter()
            .map(|v| v.name.clone())
            .collect())
    }

    /// Cast the ballot opened for `identity`.
    ///
    /// An unknown variant is rejected and the ballot stays open.
    pub fn vote(&mut self, identity: &str, choice: &str) -> ArenaResult<VoteOutcome> {
        self.ensure_voting_open()?;
        let participant = self.issuer.participant(identity)?;
        let anon_id = participant.anon_id().clone();
        if !self.open_ballots.contains(&anon_id) {
            return Err(ArenaError::BallotNotOpen);
        }
        if !self.issuer.verify_credential(&participant.credential) {
            return Err(ArenaError::InvalidCredential);
        }
        let mac_key = participant.mac_key;

        let outcome = self.voting.submit_vote(
            &anon_id,
            &mac_key,
            choice.trim(),
            self.issuer.len(),
            &mut self.rng,
        )?;
        self.open_ballots.remove(&anon_id);

        match &outcome {
            VoteOutcome::Pending { votes, quorum } => {
                self.outbox.push(Notification::to(
                    &anon_id,
                    Event::QuorumNotMet {
                        votes: *votes,
                        quorum: *quorum,
                    },
                ));
            }
            VoteOutcome::Decided {
                variant, counts, ..
            } => self.start_tournament(variant.clone(), counts.clone()),
        }

        Ok(outcome)
    }

    fn ensure_voting_open(&self) -> ArenaResult<()> {
        match self.state {
            TournamentState::Registering | TournamentState::Voting => Ok(()),
            TournamentState::RoundInProgress | TournamentState::Finished => {
                Err(ArenaError::VotingClosed)
            }
        }
    }

    fn start_tournament(&mut self, variant: Variant, counts: Vec<(String, usize)>) {
        let field: Vec<AnonId> = self.issuer.participants().map(|p| p.anon_id().clone()).collect();
        let bracket = BracketScheduler::build_bracket(1, field, &mut self.rng);

        info!(
            "Variant {:?} selected, {} participants in round 1",
            variant.name,
            self.issuer.len()
        );

        self.outbox.push(Notification::broadcast(Event::VariantSelected {
            variant: variant.name.clone(),
            rules: variant.rules_text(),
            counts,
        }));
        self.announce_round(&bracket);

        self.engine = Some(CommitRevealMatchEngine::new(variant, bracket));
        self.state = TournamentState::RoundInProgress;
        self.voting.clear();
        self.open_ballots.clear();
    }

    // =========================================================================
    // MATCH PLAY
    // =========================================================================

    /// Commit `identity` to `raw` in its active match.
    pub fn submit_move(&mut self, identity: &str, raw: &str) -> ArenaResult<MoveReceipt> {
        let anon_id = self.issuer.participant(identity)?.anon_id().clone();
        let engine = self.engine.as_mut().ok_or(ArenaError::NotInActiveMatch)?;
        let receipt = engine.submit_move(&anon_id, raw, &mut self.rng)?;

        if receipt.both_committed {
            for side in [&anon_id, &receipt.opponent] {
                self.outbox.push(Notification::to(side, Event::BothCommitted));
            }
        }
        Ok(receipt)
    }

    /// Reveal `raw` under `nonce` for `identity`.
    pub fn reveal_move(
        &mut self,
        identity: &str,
        raw: &str,
        nonce: &str,
    ) -> ArenaResult<RevealOutcome> {
        let anon_id = self.issuer.participant(identity)?.anon_id().clone();
        let engine = self.engine.as_mut().ok_or(ArenaError::NotInActiveMatch)?;
        let outcome = engine.reveal(&anon_id, raw, nonce, &mut self.ledger, &mut self.rng)?;

        match &outcome {
            RevealOutcome::Waiting { .. } => {}
            RevealOutcome::Tie {
                opponent,
                mv,
                opponent_move,
            } => {
                self.outbox.push(Notification::to(
                    &anon_id,
                    Event::TieReplay {
                        your_move: mv.to_string(),
                        opponent_move: opponent_move.to_string(),
                    },
                ));
                self.outbox.push(Notification::to(
                    opponent,
                    Event::TieReplay {
                        your_move: opponent_move.to_string(),
                        opponent_move: mv.to_string(),
                    },
                ));
            }
            RevealOutcome::Decided(result) => self.conclude_match(result),
        }

        Ok(outcome)
    }

    fn conclude_match(&mut self, result: &MatchResult) {
        let announcement = Event::MatchResult {
            winner: self.alias_of(&result.winner),
            winner_move: result.winner_move.to_string(),
            loser: self.alias_of(&result.loser),
            loser_move: result.loser_move.to_string(),
        };
        self.outbox.push(Notification::broadcast(announcement));
        self.outbox
            .push(Notification::to(&result.loser, Event::Eliminated));

        match &result.transition {
            None => {}
            Some(RoundTransition::Next(bracket)) => {
                info!("Round {} complete", result.round);
                self.announce_round(bracket);
            }
            Some(RoundTransition::Champion(champion)) => self.finish(champion.clone()),
        }
    }

    fn announce_round(&mut self, bracket: &Bracket) {
        self.outbox.push(Notification::broadcast(Event::RoundStarted {
            round: bracket.round,
            matches: bracket.matches.len(),
        }));
        for m in &bracket.matches {
            for side in m.sides() {
                if let Some(opponent) = m.opponent_of(side) {
                    let event = Event::MatchAnnounced {
                        round: bracket.round,
                        opponent: self.alias_of(opponent),
                    };
                    self.outbox.push(Notification::to(side, event));
                }
            }
        }
        if let Some(bye) = &bracket.bye {
            self.outbox.push(Notification::to(
                bye,
                Event::Bye {
                    round: bracket.round,
                },
            ));
        }
    }

    fn finish(&mut self, champion: AnonId) {
        let alias = self.alias_of(&champion);
        info!("Tournament finished, champion {}", champion.short());

        let others: Vec<AnonId> = self
            .issuer
            .participants()
            .map(|p| p.anon_id().clone())
            .filter(|id| *id != champion)
            .collect();
        self.outbox.push(Notification::to(&champion, Event::Champion));
        for other in others {
            self.outbox.push(Notification::to(
                &other,
                Event::TournamentOver {
                    champion: alias.clone(),
                },
            ));
        }

        self.state = TournamentState::Finished;
        self.champion = Some(champion);
    }

    // =========================================================================
    // TROPHY & RESET
    // =========================================================================

    /// Redeem the victory proofs of `identity`.
    ///
    /// Only once a champion is decided. One valid proof is enough.
    /// Granting the trophy resets the tournament.
    pub fn claim_trophy(&mut self, identity: &str) -> ArenaResult<TrophyGrant> {
        if self.state != TournamentState::Finished {
            return Err(ArenaError::TournamentNotFinished);
        }
        let anon_id = self.authenticate(identity)?;
        let valid_proofs = self.ledger.claim_trophy(&anon_id)?;
        let aggregate = self.ledger.aggregate(&anon_id);
        let alias = self.alias_of(&anon_id);

        info!(
            "Trophy granted to {} ({} valid proofs)",
            anon_id.short(),
            valid_proofs
        );
        self.reset();
        self.outbox
            .push(Notification::broadcast(Event::TournamentReset { champion: alias }));

        Ok(TrophyGrant {
            valid_proofs,
            aggregate,
        })
    }

    /// Clear votes, bracket, move state and proofs. Participants stay.
    fn reset(&mut self) {
        self.voting.clear();
        self.engine = None;
        self.ledger.clear();
        self.open_ballots.clear();
        self.champion = None;
        self.state = TournamentState::Registering;
    }

    // =========================================================================
    // STATUS & ALIASES
    // =========================================================================

    /// Snapshot for the `status` command.
    pub fn status(&self) -> StatusReport {
        let bracket = self.engine.as_ref().map(CommitRevealMatchEngine::bracket);
        StatusReport {
            state: self.state,
            registered: self.issuer.len(),
            votes: self.voting.vote_count(),
            quorum: self.voting.quorum(),
            variant: self.variant().map(|v| v.name.clone()),
            round: bracket.map(|b| b.round),
            matches: bracket
                .map(|b| {
                    b.matches
                        .iter()
                        .map(|m| (self.alias_of(&m.first), self.alias_of(&m.second)))
                        .collect()
                })
                .unwrap_or_default(),
            bye: bracket
                .and_then(|b| b.bye.as_ref())
                .map(|id| self.alias_of(id)),
            champion: self.champion.as_ref().map(|id| self.alias_of(id)),
        }
    }

    /// Change the display label of `identity`.
    pub fn set_alias(&mut self, identity: &str, alias: &str) -> ArenaResult<String> {
        let alias = alias.trim();
        if alias.is_empty() || alias.chars().count() > MAX_ALIAS_LEN {
            return Err(ArenaError::InvalidCommand(format!(
                "alias must be 1 to {} characters",
                MAX_ALIAS_LEN
            )));
        }
        let own = self.issuer.anon_id_for(identity);
        if self
            .issuer
            .participants()
            .any(|p| p.alias == alias && *p.anon_id() != own)
        {
            return Err(ArenaError::InvalidCommand("alias already taken".into()));
        }

        let participant = self.issuer.participant_mut(identity)?;
        participant.alias = alias.to_string();
        Ok(participant.alias.clone())
    }

    /// Display label of `anon_id`, falling back to its short form.
    pub fn alias_of(&self, anon_id: &AnonId) -> String {
        self.issuer
            .by_anon_id(anon_id)
            .map(|p| p.alias.clone())
            .unwrap_or_else(|| anon_id.short().to_string())
    }

    fn next_alias(&mut self) -> String {
        let taken: BTreeSet<&str> = self.issuer.participants().map(|p| p.alias.as_str()).collect();
        let free: Vec<&str> = ALIAS_POOL
            .iter()
            .copied()
            .filter(|a| !taken.contains(a))
            .collect();
        if let Some(i) = self.rng.index(free.len()) {
            return free[i].to_string();
        }
        (self.issuer.len() + 1..)
            .map(|n| format!("Player {}", n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| "Player".to_string())
    }
}
