//! Role and term bookkeeping for a single node. `ReplicationState` is the
//! data the manager mutates under a lock; the transition methods encode
//! §4.5's rules directly so the manager's event loop stays thin.

use std::time::{Duration, Instant};

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug, Clone)]
pub struct ReplicationState {
    pub node_id: u64,
    pub role: Role,
    pub term: u64,
    pub leader_id: Option<u64>,
    pub votes_received: u64,
    pub election_deadline: Instant,
}

impl ReplicationState {
    pub fn new(node_id: u64, is_single_node: bool) -> Self {
        ReplicationState {
            node_id,
            // A cluster with no peers has nothing to elect against; it is
            // leader of itself from the first tick.
            role: if is_single_node { Role::Leader } else { Role::Follower },
            term: 0,
            leader_id: if is_single_node { Some(node_id) } else { None },
            votes_received: 0,
            election_deadline: Instant::now(),
        }
    }

    pub fn reset_election_deadline(&mut self, min: Duration, max: Duration) {
        let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        self.election_deadline = Instant::now() + Duration::from_millis(millis);
    }

    pub fn election_timed_out(&self) -> bool {
        Instant::now() >= self.election_deadline
    }

    /// Transitions to CANDIDATE, bumps the term, and self-votes. Returns
    /// the new term so the caller can stamp outgoing vote requests.
    pub fn start_election(&mut self) -> u64 {
        self.role = Role::Candidate;
        self.term += 1;
        self.votes_received = 1;
        self.leader_id = None;
        self.term
    }

    /// Returns true once this candidate has a strict majority of votes
    /// (self included) over a cluster of `peer_count` other nodes.
    pub fn has_majority(&self, peer_count: usize) -> bool {
        let quorum = ((peer_count + 1) / 2) as u64 + 1;
        self.votes_received >= quorum
    }

    pub fn become_leader(&mut self) {
        self.role = Role::Leader;
        self.leader_id = Some(self.node_id);
    }

    /// A heartbeat from a leader at `term` is always obeyed if its term is
    /// at least as new as ours: we adopt the term and step down to
    /// follower, regardless of our current role.
    pub fn receive_heartbeat(&mut self, term: u64, leader_id: u64) -> bool {
        if term >= self.term {
            self.term = term;
            self.role = Role::Follower;
            self.leader_id = Some(leader_id);
            true
        } else {
            false
        }
    }

    /// A vote is granted only for a strictly newer term than ours; there is
    /// no persisted `voted_for`, so a restarted node can grant a second
    /// vote within the same term it already voted in before the restart.
    pub fn receive_vote_request(&mut self, term: u64) -> bool {
        if term > self.term {
            self.term = term;
            self.role = Role::Follower;
            self.leader_id = None;
            true
        } else {
            false
        }
    }

    pub fn record_vote_granted(&mut self) {
        self.votes_received += 1;
    }

    pub fn step_down(&mut self) {
        self.role = Role::Follower;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_starts_as_leader() {
        let state = ReplicationState::new(1, true);
        assert_eq!(state.role, Role::Leader);
        assert_eq!(state.leader_id, Some(1));
    }

    #[test]
    fn multi_node_starts_as_follower_with_no_leader() {
        let state = ReplicationState::new(1, false);
        assert_eq!(state.role, Role::Follower);
        assert_eq!(state.leader_id, None);
    }

    #[test]
    fn start_election_increments_term_and_self_votes() {
        let mut state = ReplicationState::new(1, false);
        let term = state.start_election();
        assert_eq!(term, 1);
        assert_eq!(state.role, Role::Candidate);
        assert_eq!(state.votes_received, 1);
    }

    #[test]
    fn majority_requires_strictly_more_than_half() {
        let mut state = ReplicationState::new(1, false);
        state.start_election(); // votes_received = 1, peer_count = 2 -> need 2
        assert!(!state.has_majority(2));
        state.record_vote_granted(); // 2 votes
        assert!(state.has_majority(2));
    }

    #[test]
    fn heartbeat_with_higher_term_demotes_leader() {
        let mut state = ReplicationState::new(1, false);
        state.role = Role::Leader;
        state.term = 2;
        let adopted = state.receive_heartbeat(5, 9);
        assert!(adopted);
        assert_eq!(state.role, Role::Follower);
        assert_eq!(state.term, 5);
        assert_eq!(state.leader_id, Some(9));
    }

    #[test]
    fn heartbeat_with_stale_term_is_ignored() {
        let mut state = ReplicationState::new(1, false);
        state.term = 5;
        state.role = Role::Leader;
        let adopted = state.receive_heartbeat(3, 9);
        assert!(!adopted);
        assert_eq!(state.role, Role::Leader);
        assert_eq!(state.term, 5);
    }

    #[test]
    fn vote_request_requires_strictly_greater_term() {
        let mut state = ReplicationState::new(1, false);
        state.term = 3;
        assert!(!state.receive_vote_request(3));
        assert!(state.receive_vote_request(4));
        assert_eq!(state.term, 4);
        assert_eq!(state.role, Role::Follower);
    }
}
