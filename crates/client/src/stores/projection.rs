//! Client-side projection of a live quiz session.
//!
//! The projection is only ever changed by folding a [`ServerEvent`] into it.
//! [`fold`] is pure and total: it never fails, and entities referenced by an
//! event before they were seen are synthesized as placeholders.

use std::collections::BTreeMap;

use quizroom_shared::{
    GamePhase, Player, PlayerAnswer, PlayerId, Question, QuestionId, ServerEvent, SessionSnapshot,
};

/// What every view of a session renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub players: BTreeMap<PlayerId, Player>,
    /// Questions in server order.
    pub all_questions: Vec<Question>,
    pub active_question_id: Option<QuestionId>,
    /// `questionId -> playerId -> answer`; at most one answer per pair.
    pub player_answers: BTreeMap<QuestionId, BTreeMap<PlayerId, PlayerAnswer>>,
    pub phase: GamePhase,
}

/// Empty lobby projection.
pub fn initial() -> Projection {
    Projection::initial()
}

/// Fold one event into `projection`, returning the next projection.
pub fn fold(projection: &Projection, event: &ServerEvent) -> Projection {
    projection.fold(event)
}

impl Projection {
    pub fn initial() -> Self {
        Self::default()
    }

    /// Build a projection that mirrors a server snapshot exactly.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let mut next = Self {
            players: snapshot
                .players
                .iter()
                .map(|p| (p.id.clone(), p.clone()))
                .collect(),
            all_questions: snapshot.all_questions.clone(),
            active_question_id: snapshot.active_question_id.clone(),
            player_answers: BTreeMap::new(),
            phase: snapshot.phase,
        };
        if let Some(id) = snapshot.active_question_id.as_deref() {
            next.ensure_question(id);
        }
        for answer in &snapshot.player_answers {
            next.upsert_answer(answer.clone());
        }
        next
    }

    pub fn fold(&self, event: &ServerEvent) -> Self {
        match event {
            ServerEvent::StateSnapshot(snapshot) => Self::from_snapshot(snapshot),
            ServerEvent::Unknown { .. } => self.clone(),
            _ => {
                let mut next = self.clone();
                next.apply(event);
                next
            }
        }
    }

    fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::QuestionChanged { question_id } => {
                self.ensure_question(question_id);
                self.active_question_id = Some(question_id.clone());
                // Explicit change-question re-enters QUESTION_ACTIVE from any
                // phase but ENDED
                if !self.phase.is_terminal() {
                    self.phase = GamePhase::QuestionActive;
                }
            }
            ServerEvent::AnswersShown { question_id } => {
                if let Some(id) = question_id {
                    self.ensure_question(id);
                }
                self.advance_phase(GamePhase::AnswersShown);
            }
            ServerEvent::PlayerJoined { player } => match self.players.get_mut(&player.id) {
                Some(existing) => {
                    if !player.name.is_empty() {
                        existing.name = player.name.clone();
                    }
                }
                None => {
                    self.players.insert(player.id.clone(), player.clone());
                }
            },
            ServerEvent::AnswerReceived(answer) => self.upsert_answer(answer.clone()),
            ServerEvent::WinnersShown { scores } => {
                for (player_id, score) in scores {
                    self.ensure_player(player_id).score = *score;
                }
                self.advance_phase(GamePhase::WinnersShown);
            }
            ServerEvent::GameEnded => self.phase = GamePhase::Ended,
            ServerEvent::StateSnapshot(_) | ServerEvent::Unknown { .. } => {}
        }
    }

    fn advance_phase(&mut self, target: GamePhase) {
        self.phase = self.phase.max(target);
    }

    fn ensure_question(&mut self, id: &str) {
        if self.question(id).is_none() {
            self.all_questions.push(Question::placeholder(id));
        }
    }

    fn ensure_player(&mut self, id: &str) -> &mut Player {
        self.players
            .entry(id.to_string())
            .or_insert_with(|| Player::placeholder(id))
    }

    fn upsert_answer(&mut self, answer: PlayerAnswer) {
        self.ensure_player(&answer.player_id);
        self.ensure_question(&answer.question_id);
        self.player_answers
            .entry(answer.question_id.clone())
            .or_default()
            .insert(answer.player_id.clone(), answer);
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.all_questions.iter().find(|q| q.id == id)
    }

    pub fn active_question(&self) -> Option<&Question> {
        self.active_question_id
            .as_deref()
            .and_then(|id| self.question(id))
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    /// Answers submitted for a question, ordered by player id.
    pub fn answers_for(&self, question_id: &str) -> Vec<&PlayerAnswer> {
        self.player_answers
            .get(question_id)
            .map(|answers| answers.values().collect())
            .unwrap_or_default()
    }

    pub fn answer(&self, question_id: &str, player_id: &str) -> Option<&PlayerAnswer> {
        self.player_answers
            .get(question_id)
            .and_then(|answers| answers.get(player_id))
    }

    /// Players by server-assigned score, highest first; ties by name.
    pub fn leaderboard(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.display_name().cmp(b.display_name()))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_terminal()
    }
}
