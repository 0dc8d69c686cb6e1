//! Local falling droplets.
//!
//! Each client runs its own physics: a problem seen on the shared record is
//! turned into a droplet at the top of the field and falls at its own pace.
//! Nothing about droplets is written back; answering one only affects the
//! local game.

use droprain_shared::constants::CANVAS_HEIGHT;
use droprain_shared::{ItemType, Problem, ProblemKey};

#[derive(Debug, Clone, PartialEq)]
pub struct Droplet {
    pub id: u64,
    pub multiplicand: u32,
    pub multiplier: u32,
    pub answer: u32,
    pub label: String,
    pub x: f64,
    pub y: f64,
    /// Pixels per frame at normal speed.
    pub speed: f64,
    pub item_type: Option<ItemType>,
}

#[derive(Debug, Default)]
pub struct DropletField {
    droplets: Vec<Droplet>,
    next_id: u64,
    /// Key of the last shared problem turned into a droplet.
    last_key: Option<ProblemKey>,
}

impl DropletField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn droplets(&self) -> &[Droplet] {
        &self.droplets
    }

    pub fn len(&self) -> usize {
        self.droplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.droplets.is_empty()
    }

    pub fn clear(&mut self) {
        self.droplets.clear();
    }

    /// Drop a droplet for `problem` at the top of the field.
    pub fn spawn_local(&mut self, problem: &Problem) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.droplets.push(Droplet {
            id,
            multiplicand: problem.multiplicand,
            multiplier: problem.multiplier,
            answer: problem.answer,
            label: problem.problem.clone(),
            x: problem.x,
            y: problem.y,
            speed: problem.speed,
            item_type: problem.item_type,
        });
        id
    }

    /// Treat the room's current problem as a spawn signal.  A key spawns at
    /// most one droplet, however often it is re-read.  Returns whether a
    /// droplet was added.
    pub fn ingest_shared(&mut self, problem: Option<&Problem>, active: bool) -> bool {
        let Some(problem) = problem.filter(|_| active) else {
            return false;
        };
        let key = problem.key();
        if self.last_key.as_ref() == Some(&key) {
            return false;
        }
        self.last_key = Some(key);
        self.spawn_local(problem);
        true
    }

    /// Advance every droplet by `frames` frames at `multiplier` times its
    /// speed.  Droplets past the bottom are removed; returns how many.
    pub fn tick(&mut self, frames: u32, multiplier: f64) -> u32 {
        let before = self.droplets.len();
        for droplet in &mut self.droplets {
            droplet.y += droplet.speed * multiplier * f64::from(frames);
        }
        self.droplets.retain(|d| d.y <= CANVAS_HEIGHT);
        (before - self.droplets.len()) as u32
    }

    /// Remove and return the lowest droplet whose answer is `answer`.
    pub fn check_answer(&mut self, answer: u32) -> Option<Droplet> {
        let index = lowest_index(self.droplets.iter().enumerate().filter(|(_, d)| d.answer == answer))?;
        Some(self.droplets.remove(index))
    }

    /// Remove and return the lowest droplet.
    pub fn remove_lowest(&mut self) -> Option<Droplet> {
        let index = lowest_index(self.droplets.iter().enumerate())?;
        Some(self.droplets.remove(index))
    }
}

fn lowest_index<'a>(candidates: impl Iterator<Item = (usize, &'a Droplet)>) -> Option<usize> {
    candidates
        .fold(None::<(usize, f64)>, |lowest, (i, d)| match lowest {
            Some((_, y)) if y >= d.y => lowest,
            _ => Some((i, d.y)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn problem(a: u32, b: u32, y: f64) -> Problem {
        Problem {
            multiplicand: a,
            multiplier: b,
            answer: a * b,
            problem: format!("{a}×{b}"),
            x: 200.0,
            y,
            speed: 2.0,
            item_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn shared_problem_spawns_once_per_key() {
        let mut field = DropletField::new();
        let p = problem(3, 4, -50.0);

        assert!(!field.ingest_shared(Some(&p), false));
        assert!(field.ingest_shared(Some(&p), true));
        assert!(!field.ingest_shared(Some(&p), true));
        assert!(!field.ingest_shared(None, true));

        let mut later = p.clone();
        later.created_at = p.created_at + Duration::seconds(3);
        assert!(field.ingest_shared(Some(&later), true));
        assert_eq!(field.len(), 2);
    }

    #[test]
    fn droplets_past_the_bottom_are_missed() {
        let mut field = DropletField::new();
        field.spawn_local(&problem(2, 2, 591.0));
        field.spawn_local(&problem(2, 3, 0.0));

        assert_eq!(field.tick(4, 1.0), 0);
        assert_eq!(field.tick(1, 1.0), 1);
        assert_eq!(field.len(), 1);

        // Slowed droplets cover less ground.
        field.tick(10, 0.4);
        assert!((field.droplets()[0].y - 18.0).abs() < 1e-9);
    }

    #[test]
    fn answer_takes_the_lowest_match() {
        let mut field = DropletField::new();
        field.spawn_local(&problem(3, 4, 100.0));
        let low = field.spawn_local(&problem(2, 6, 300.0));
        field.spawn_local(&problem(4, 3, 200.0));

        assert_eq!(field.check_answer(12).map(|d| d.id), Some(low));
        assert_eq!(field.check_answer(12).map(|d| d.y), Some(200.0));
        assert!(field.check_answer(99).is_none());
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn remove_lowest_on_empty_field() {
        let mut field = DropletField::new();
        assert!(field.remove_lowest().is_none());
        field.spawn_local(&problem(5, 5, 10.0));
        field.spawn_local(&problem(5, 6, 20.0));
        assert_eq!(field.remove_lowest().map(|d| d.answer), Some(30));
    }
}
