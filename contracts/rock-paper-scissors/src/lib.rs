//! Stellarcade Rock Paper Scissors Contract
//!
//! A two-player commit-reveal wagering game with optional token stakes,
//! deadline-based forfeiture and persistent per-player statistics.
//!
//! ## Game Flow
//! 1. Challenger calls `challenge` with `sha256(move_u8 || secret)` and an
//!    optional stake. The match opens in `Commit` with a 7-day commit deadline.
//! 2. Challenged player calls `respond` with a plain move and an optional
//!    stake. The match moves to `Reveal` with a 7-day reveal deadline.
//! 3. Challenger calls `reveal` with the move and secret. A correct reveal
//!    settles by the win rule; a wrong reveal forfeits.
//!
//! If a party misses its deadline the other side calls
//! `claim_challenged_no_show` / `claim_challenger_no_show`. Deadlines are also
//! checked lazily inside `respond` and `reveal`.
//!
//! ## Custody
//! The contract never holds funds. A stake is an exact `approve` from the
//! staker to this contract on a SEP-41 token; at settlement the contract calls
//! `transfer_from` from each staker to the computed recipient. A failed
//! transfer reverts the whole invocation and leaves the match untouched.
//! Passing `give_up = true` skips distribution so a match can always be
//! closed, e.g. after a party revoked its allowance.
//!
//! ## Storage Strategy
//! - `instance()`: the match id counter.
//! - `persistent()`: one `Match` per canonical address pair and one
//!   `PlayerStats` per address, each bumped on every write.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, Bytes, BytesN, Env,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Time each party has to act in its phase: 7 days, in ledger seconds.
pub const PHASE_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    SelfChallenge             = 1,
    InvalidOpponent           = 2,
    EmptyCommitment           = 3,
    DuplicateMatch            = 4,
    InsufficientAuthorization = 5,
    NoSuchMatch               = 6,
    WrongPhase                = 7,
    DeadlineNotYetPassed      = 8,
    InvalidAmount             = 9,
    TransferFailed            = 10,
    Overflow                  = 11,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// A hand. The discriminant is the byte hashed into the commitment.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Move {
    Rock     = 0,
    Paper    = 1,
    Scissors = 2,
}

impl Move {
    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    pub fn beats(&self, other: &Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors)
                | (Move::Scissors, Move::Paper)
                | (Move::Paper, Move::Rock)
        )
    }
}

/// Match lifecycle: Commit → Reveal → removed at settlement.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Commit = 0,
    Reveal = 1,
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GameResult {
    ChallengerWin        = 0,
    ChallengedWin        = 1,
    Draw                 = 2,
    ChallengerChickenOut = 3,
    ChallengedChickenOut = 4,
}

/// Tokens one side has approved for the match. `token == None` means no stake.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stake {
    pub token:  Option<Address>,
    pub amount: i128,
}

impl Stake {
    pub fn none() -> Self {
        Stake { token: None, amount: 0 }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Match {
    pub id:               u64,
    pub challenger:       Address,
    pub challenged:       Address,
    /// `sha256(move_u8 || secret)` published by the challenger.
    pub commitment:       BytesN<32>,
    pub phase:            Phase,
    pub challenger_stake: Stake,
    pub challenged_stake: Stake,
    /// Meaningful only once `phase` is `Reveal`; `Rock` until then.
    pub challenged_move:  Move,
    pub commit_deadline:  u64,
    /// Zero until the match reaches `Reveal`.
    pub reveal_deadline:  u64,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlayerStats {
    pub wins:         u32,
    pub losses:       u32,
    pub draws:        u32,
    pub chicken_outs: u32,
}

/// Storage key discriminants.
///
/// `Match` is keyed by the address pair sorted ascending, so a match between
/// A and B occupies one slot whichever of them issued the challenge.
#[contracttype]
pub enum DataKey {
    // --- instance() ---
    MatchCount,
    // --- persistent() ---
    Match(Address, Address),
    Stats(Address),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct GameStarted {
    #[topic]
    pub match_id: u64,
    #[topic]
    pub challenger: Address,
    pub challenged: Address,
    pub commit_deadline: u64,
    pub stake_token: Option<Address>,
    pub stake_amount: i128,
}

#[contractevent]
pub struct GameOn {
    #[topic]
    pub match_id: u64,
    #[topic]
    pub challenged: Address,
    pub challenger: Address,
    pub reveal_deadline: u64,
    pub stake_token: Option<Address>,
    pub stake_amount: i128,
}

#[contractevent]
pub struct GameFinished {
    #[topic]
    pub match_id: u64,
    #[topic]
    pub challenger: Address,
    pub challenged: Address,
    pub result: GameResult,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct RockPaperScissors;

#[contractimpl]
impl RockPaperScissors {
    // -----------------------------------------------------------------------
    // challenge
    // -----------------------------------------------------------------------

    /// Open a match against `challenged` with a committed move.
    ///
    /// The stake is recorded only when `stake_token` is set and
    /// `stake_amount > 0`; the token allowance from `challenger` to this
    /// contract must equal `stake_amount` exactly. Returns the new match id.
    pub fn challenge(
        env:          Env,
        challenger:   Address,
        challenged:   Address,
        commitment:   BytesN<32>,
        stake_token:  Option<Address>,
        stake_amount: i128,
    ) -> Result<u64, Error> {
        challenger.require_auth();

        if challenger == challenged {
            return Err(Error::SelfChallenge);
        }
        if challenged == env.current_contract_address() {
            return Err(Error::InvalidOpponent);
        }
        if commitment == BytesN::from_array(&env, &[0u8; 32]) {
            return Err(Error::EmptyCommitment);
        }

        let key = match_key(&challenger, &challenged);
        if env.storage().persistent().has(&key) {
            return Err(Error::DuplicateMatch);
        }

        let stake = declare_stake(&env, &challenger, stake_token, stake_amount)?;
        let id = next_match_id(&env)?;
        let commit_deadline = deadline_from_now(&env)?;

        let game = Match {
            id,
            challenger: challenger.clone(),
            challenged: challenged.clone(),
            commitment,
            phase: Phase::Commit,
            challenger_stake: stake.clone(),
            challenged_stake: Stake::none(),
            challenged_move: Move::Rock,
            commit_deadline,
            reveal_deadline: 0,
        };
        set_persistent(&env, &key, &game);

        GameStarted {
            match_id: id,
            challenger,
            challenged,
            commit_deadline,
            stake_token: stake.token,
            stake_amount: stake.amount,
        }
        .publish(&env);

        Ok(id)
    }

    // -----------------------------------------------------------------------
    // respond
    // -----------------------------------------------------------------------

    /// Answer a challenge with a plain move and an optional stake.
    ///
    /// If the commit deadline has already passed the move is ignored and the
    /// match settles as `ChallengedChickenOut`; that result is returned.
    /// Otherwise the match moves to `Reveal` and `None` is returned.
    pub fn respond(
        env:          Env,
        challenged:   Address,
        challenger:   Address,
        mv:           Move,
        stake_token:  Option<Address>,
        stake_amount: i128,
        give_up:      bool,
    ) -> Result<Option<GameResult>, Error> {
        challenged.require_auth();

        let (key, mut game) = load_match(&env, &challenger, &challenged)?;
        if game.phase != Phase::Commit {
            return Err(Error::WrongPhase);
        }

        if env.ledger().timestamp() > game.commit_deadline {
            let result = GameResult::ChallengedChickenOut;
            settle(&env, &key, game, result, give_up)?;
            return Ok(Some(result));
        }

        let stake = declare_stake(&env, &challenged, stake_token, stake_amount)?;
        let reveal_deadline = deadline_from_now(&env)?;

        game.phase = Phase::Reveal;
        game.challenged_move = mv;
        game.challenged_stake = stake.clone();
        game.reveal_deadline = reveal_deadline;
        set_persistent(&env, &key, &game);

        GameOn {
            match_id: game.id,
            challenged,
            challenger,
            reveal_deadline,
            stake_token: stake.token,
            stake_amount: stake.amount,
        }
        .publish(&env);

        Ok(None)
    }

    // -----------------------------------------------------------------------
    // reveal
    // -----------------------------------------------------------------------

    /// Open the commitment and settle the match.
    ///
    /// A reveal after the deadline, or one that does not reproduce the stored
    /// commitment, settles as `ChallengerChickenOut`.
    pub fn reveal(
        env:        Env,
        challenger: Address,
        challenged: Address,
        secret:     Bytes,
        mv:         Move,
        give_up:    bool,
    ) -> Result<GameResult, Error> {
        challenger.require_auth();

        let (key, game) = load_match(&env, &challenger, &challenged)?;
        if game.phase != Phase::Reveal {
            return Err(Error::WrongPhase);
        }

        let result = if env.ledger().timestamp() > game.reveal_deadline
            || !commitment_matches(&env, &game.commitment, &secret, mv)
        {
            GameResult::ChallengerChickenOut
        } else {
            judge(mv, game.challenged_move)
        };

        settle(&env, &key, game, result, give_up)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // no-show claims
    // -----------------------------------------------------------------------

    /// Challenger claims the match after the challenged player missed the
    /// commit deadline.
    pub fn claim_challenged_no_show(
        env:        Env,
        challenger: Address,
        challenged: Address,
        give_up:    bool,
    ) -> Result<bool, Error> {
        challenger.require_auth();

        let (key, game) = load_match(&env, &challenger, &challenged)?;
        if game.phase != Phase::Commit {
            return Err(Error::WrongPhase);
        }
        if env.ledger().timestamp() <= game.commit_deadline {
            return Err(Error::DeadlineNotYetPassed);
        }

        settle(&env, &key, game, GameResult::ChallengedChickenOut, give_up)?;
        Ok(true)
    }

    /// Challenged player claims the match after the challenger missed the
    /// reveal deadline.
    pub fn claim_challenger_no_show(
        env:        Env,
        challenged: Address,
        challenger: Address,
        give_up:    bool,
    ) -> Result<bool, Error> {
        challenged.require_auth();

        let (key, game) = load_match(&env, &challenger, &challenged)?;
        if game.phase != Phase::Reveal {
            return Err(Error::WrongPhase);
        }
        if env.ledger().timestamp() <= game.reveal_deadline {
            return Err(Error::DeadlineNotYetPassed);
        }

        settle(&env, &key, game, GameResult::ChallengerChickenOut, give_up)?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // views
    // -----------------------------------------------------------------------

    /// Check a (move, secret) pair against a commitment. Touches no state.
    pub fn verify_commitment(env: Env, commitment: BytesN<32>, secret: Bytes, mv: Move) -> bool {
        commitment_matches(&env, &commitment, &secret, mv)
    }

    /// Build the commitment for a (move, secret) pair with the host hash.
    pub fn compute_commitment(env: Env, mv: Move, secret: Bytes) -> BytesN<32> {
        hash_move(&env, mv, &secret)
    }

    pub fn get_stats(env: Env, player: Address) -> PlayerStats {
        env.storage()
            .persistent()
            .get(&DataKey::Stats(player))
            .unwrap_or_default()
    }

    /// Look up the open match with `challenger` and `challenged` in those roles.
    pub fn get_match(env: Env, challenger: Address, challenged: Address) -> Result<Match, Error> {
        load_match(&env, &challenger, &challenged).map(|(_, game)| game)
    }

    /// Id of the most recently created match; zero before the first challenge.
    pub fn match_count(env: Env) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::MatchCount)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Game rules
// ---------------------------------------------------------------------------

fn judge(challenger_move: Move, challenged_move: Move) -> GameResult {
    if challenger_move == challenged_move {
        GameResult::Draw
    } else if challenger_move.beats(&challenged_move) {
        GameResult::ChallengerWin
    } else {
        GameResult::ChallengedWin
    }
}

fn hash_move(env: &Env, mv: Move, secret: &Bytes) -> BytesN<32> {
    let mut preimage = Bytes::new(env);
    preimage.push_back(mv as u8);
    preimage.append(secret);
    env.crypto().sha256(&preimage).into()
}

fn commitment_matches(env: &Env, commitment: &BytesN<32>, secret: &Bytes, mv: Move) -> bool {
    hash_move(env, mv, secret) == *commitment
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Which counter a settlement bumps on a player's record.
#[derive(Clone, Copy)]
enum Tally {
    Win,
    Loss,
    Draw,
    ChickenOut,
}

impl PlayerStats {
    fn record(&mut self, tally: Tally) -> Result<(), Error> {
        let counter = match tally {
            Tally::Win => &mut self.wins,
            Tally::Loss => &mut self.losses,
            Tally::Draw => &mut self.draws,
            Tally::ChickenOut => &mut self.chicken_outs,
        };
        *counter = counter.checked_add(1).ok_or(Error::Overflow)?;
        Ok(())
    }
}

/// The only path that removes a match.
///
/// Storage and stats are written before any token call. If a transfer fails
/// the returned error reverts the invocation, including the removal.
fn settle(
    env: &Env,
    key: &DataKey,
    game: Match,
    result: GameResult,
    give_up: bool,
) -> Result<(), Error> {
    let Match {
        id,
        challenger,
        challenged,
        challenger_stake,
        challenged_stake,
        ..
    } = game;

    env.storage().persistent().remove(key);

    match result {
        GameResult::ChallengerWin => {
            record(env, &challenger, Tally::Win)?;
            record(env, &challenged, Tally::Loss)?;
        }
        GameResult::ChallengedWin => {
            record(env, &challenged, Tally::Win)?;
            record(env, &challenger, Tally::Loss)?;
        }
        GameResult::Draw => {
            record(env, &challenger, Tally::Draw)?;
            record(env, &challenged, Tally::Draw)?;
        }
        GameResult::ChallengerChickenOut => record(env, &challenger, Tally::ChickenOut)?,
        GameResult::ChallengedChickenOut => record(env, &challenged, Tally::ChickenOut)?,
    }

    if !give_up {
        let (challenger_stake_to, challenged_stake_to) = match result {
            GameResult::ChallengerWin | GameResult::ChallengedChickenOut => {
                (&challenger, &challenger)
            }
            GameResult::ChallengedWin | GameResult::ChallengerChickenOut => {
                (&challenged, &challenged)
            }
            GameResult::Draw => (&challenger, &challenged),
        };
        transfer_stake(env, &challenger, challenger_stake_to, &challenger_stake)?;
        transfer_stake(env, &challenged, challenged_stake_to, &challenged_stake)?;
    }

    GameFinished {
        match_id: id,
        challenger,
        challenged,
        result,
    }
    .publish(env);

    Ok(())
}

fn record(env: &Env, player: &Address, tally: Tally) -> Result<(), Error> {
    let key = DataKey::Stats(player.clone());
    let mut stats: PlayerStats = env.storage().persistent().get(&key).unwrap_or_default();
    stats.record(tally)?;
    set_persistent(env, &key, &stats);
    Ok(())
}

fn transfer_stake(env: &Env, from: &Address, to: &Address, stake: &Stake) -> Result<(), Error> {
    let token = match &stake.token {
        Some(token) if stake.amount > 0 => token,
        _ => return Ok(()),
    };

    match TokenClient::new(env, token).try_transfer_from(
        &env.current_contract_address(),
        from,
        to,
        &stake.amount,
    ) {
        Ok(Ok(())) => Ok(()),
        _ => Err(Error::TransferFailed),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn match_key(a: &Address, b: &Address) -> DataKey {
    if a < b {
        DataKey::Match(a.clone(), b.clone())
    } else {
        DataKey::Match(b.clone(), a.clone())
    }
}

/// Fetch the match between the two addresses, requiring the given roles.
fn load_match(
    env: &Env,
    challenger: &Address,
    challenged: &Address,
) -> Result<(DataKey, Match), Error> {
    let key = match_key(challenger, challenged);
    let game: Match = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(Error::NoSuchMatch)?;

    if game.challenger != *challenger || game.challenged != *challenged {
        return Err(Error::NoSuchMatch);
    }
    Ok((key, game))
}

/// Validate a declared stake against the owner's allowance to this contract.
fn declare_stake(
    env: &Env,
    owner: &Address,
    token: Option<Address>,
    amount: i128,
) -> Result<Stake, Error> {
    if amount < 0 {
        return Err(Error::InvalidAmount);
    }

    match token {
        Some(token) if amount > 0 => {
            let authorized = TokenClient::new(env, &token)
                .allowance(owner, &env.current_contract_address());
            // Exact match, not sufficiency.
            if authorized != amount {
                return Err(Error::InsufficientAuthorization);
            }
            Ok(Stake { token: Some(token), amount })
        }
        _ => Ok(Stake::none()),
    }
}

fn next_match_id(env: &Env) -> Result<u64, Error> {
    let current: u64 = env
        .storage()
        .instance()
        .get(&DataKey::MatchCount)
        .unwrap_or(0);
    let next = current.checked_add(1).ok_or(Error::Overflow)?;

    env.storage().instance().set(&DataKey::MatchCount, &next);
    env.storage()
        .instance()
        .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
    Ok(next)
}

fn deadline_from_now(env: &Env) -> Result<u64, Error> {
    env.ledger()
        .timestamp()
        .checked_add(PHASE_WINDOW_SECS)
        .ok_or(Error::Overflow)
}

fn set_persistent<T>(env: &Env, key: &DataKey, value: &T)
where
    T: soroban_sdk::IntoVal<Env, soroban_sdk::Val>,
{
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
