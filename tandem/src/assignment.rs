//! Stable one-to-one assignment between the rows and columns of a score
//! matrix.
//!
//! Each round picks the first unassigned member of the larger side and its
//! best partner on the smaller side, then lets that partner look for
//! something strictly better. A partner that finds a better match displaces
//! recursively, so proposals form a chain; the chain unwinds by recording
//! assignments. The result always has exactly `min(rows, cols)` pairs, and
//! the solver terminates for any scores, infinities included.
//!
//! Ties go to whichever candidate comes first in pool order.

use crate::trace;

/// A dense `rows × cols` matrix of pairing scores.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    rows: usize,
    cols: usize,
    scores: Vec<f32>,
}

impl ScoreMatrix {
    /// Build a matrix by scoring every `(row, col)` pair.
    pub fn from_fn(rows: usize, cols: usize, mut score: impl FnMut(usize, usize) -> f32) -> Self {
        let mut scores = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                scores.push(score(row, col));
            }
        }
        Self { rows, cols, scores }
    }

    /// Build a matrix from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[&[f32]]) -> Self {
        let cols = rows.first().map_or(0, |row| row.len());
        Self::from_fn(rows.len(), cols, |row, col| rows[row][col])
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Score of pairing `row` with `col`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.scores[row * self.cols + col]
    }
}

/// One pair in the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Row index
    pub row: usize,
    /// Column index
    pub col: usize,
    /// Score of the pair
    pub score: f32,
}

/// Compute a stable assignment.
pub fn assign(matrix: &ScoreMatrix) -> Vec<Assignment> {
    let mut solver = Solver {
        matrix,
        rows: Pool::new(matrix.rows),
        cols: Pool::new(matrix.cols),
        assignments: Vec::with_capacity(matrix.rows.min(matrix.cols)),
    };
    solver.run();
    trace!(
        rows = matrix.rows,
        cols = matrix.cols,
        assigned = solver.assignments.len(),
        "assignment solved"
    );
    solver.assignments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Rows,
    Cols,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Rows => Side::Cols,
            Side::Cols => Side::Rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// The walker found a better partner and was assigned further down.
    FoundBetter,
    /// Nobody beats what the walker was offered.
    NoBetter,
    /// The given side ran out of unassigned members.
    Exhausted(Side),
}

/// Unassigned members of one side: a doubly linked list over `0..len`, so
/// removal is O(1) and iteration keeps index order.
#[derive(Debug)]
struct Pool {
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    live: Vec<bool>,
    head: Option<usize>,
}

impl Pool {
    fn new(len: usize) -> Self {
        Self {
            prev: (0..len).map(|i| i.checked_sub(1)).collect(),
            next: (0..len).map(|i| Some(i + 1).filter(|&n| n < len)).collect(),
            live: vec![true; len],
            head: if len == 0 { None } else { Some(0) },
        }
    }

    fn first(&self) -> Option<usize> {
        self.head
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(self.head, move |&i| self.next[i])
    }

    fn remove(&mut self, i: usize) {
        if !self.live[i] {
            return;
        }
        self.live[i] = false;
        let (prev, next) = (self.prev[i], self.next[i]);
        match prev {
            Some(p) => self.next[p] = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.prev[n] = prev;
        }
    }
}

/// One pending step of a proposal chain.
struct Frame {
    side: Side,
    member: usize,
    offered: f32,
    proposal: Option<(usize, f32)>,
}

struct Solver<'m> {
    matrix: &'m ScoreMatrix,
    rows: Pool,
    cols: Pool,
    assignments: Vec<Assignment>,
}

impl Solver<'_> {
    fn pool(&self, side: Side) -> &Pool {
        match side {
            Side::Rows => &self.rows,
            Side::Cols => &self.cols,
        }
    }

    fn pool_mut(&mut self, side: Side) -> &mut Pool {
        match side {
            Side::Rows => &mut self.rows,
            Side::Cols => &mut self.cols,
        }
    }

    fn score(&self, side: Side, member: usize, partner: usize) -> f32 {
        match side {
            Side::Rows => self.matrix.get(member, partner),
            Side::Cols => self.matrix.get(partner, member),
        }
    }

    fn assign(&mut self, side: Side, member: usize, partner: usize, score: f32) {
        let (row, col) = match side {
            Side::Rows => (member, partner),
            Side::Cols => (partner, member),
        };
        self.assignments.push(Assignment { row, col, score });
    }

    /// Best unassigned partner for `member` (a member of `side`), first one
    /// wins on ties.
    fn best_partner(&self, side: Side, member: usize) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for candidate in self.pool(side.other()).iter() {
            let score = self.score(side, member, candidate);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((candidate, score)),
            }
        }
        best
    }

    fn run(&mut self) {
        // The larger side drives the rounds.
        let driving = if self.matrix.rows < self.matrix.cols {
            Side::Cols
        } else {
            Side::Rows
        };
        let roaming = driving.other();
        loop {
            let Some(first) = self.pool(driving).first() else {
                return;
            };
            let Some((best, score)) = self.best_partner(driving, first) else {
                return;
            };
            if self.walk(roaming, best, score) == Walk::NoBetter {
                self.pool_mut(driving).remove(first);
                self.assign(driving, first, best, score);
            }
        }
    }

    /// Let `member` leave its pool and look for a partner it prefers over
    /// `offered`.
    fn walk(&mut self, side: Side, member: usize, offered: f32) -> Walk {
        self.pool_mut(side).remove(member);
        let mut stack = vec![Frame {
            side,
            member,
            offered,
            proposal: None,
        }];
        let mut returned: Option<Walk> = None;

        while let Some(frame) = stack.last_mut() {
            let mut finished = None;

            if let Some(result) = returned.take() {
                if let Some((partner, score)) = frame.proposal.take() {
                    match result {
                        Walk::FoundBetter => {}
                        Walk::NoBetter => finished = Some((partner, score, Walk::FoundBetter)),
                        Walk::Exhausted(exhausted) if exhausted == frame.side => {
                            finished = Some((partner, score, Walk::Exhausted(exhausted)))
                        }
                        Walk::Exhausted(_) => {}
                    }
                }
            }

            if let Some((partner, score, result)) = finished {
                let (side, member) = (frame.side, frame.member);
                stack.pop();
                self.assign(side, member, partner, score);
                returned = Some(result);
                continue;
            }

            let (side, member, offered) = (frame.side, frame.member, frame.offered);
            match self.best_partner(side, member) {
                None => {
                    stack.pop();
                    returned = Some(Walk::Exhausted(side.other()));
                }
                Some((_, score)) if score <= offered => {
                    stack.pop();
                    returned = Some(Walk::NoBetter);
                }
                Some((partner, score)) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.proposal = Some((partner, score));
                    }
                    let side = side.other();
                    self.pool_mut(side).remove(partner);
                    stack.push(Frame {
                        side,
                        member: partner,
                        offered: score,
                        proposal: None,
                    });
                }
            }
        }

        returned.unwrap_or(Walk::NoBetter)
    }
}
