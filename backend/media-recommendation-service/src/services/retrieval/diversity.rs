use rand::seq::{index, SliceRandom};
use rand::Rng;

/// Diversity Layer - novelty injection
///
/// With probability `factor` the final list keeps only the top `n / 2`
/// ranked entries and fills the rest with uniform picks from entries ranked
/// below the top `n`. Otherwise the list is the plain top `n`.
pub struct DiversityLayer {
    factor: f64,
}

impl DiversityLayer {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
        }
    }

    pub fn select<T: Clone, R: Rng + ?Sized>(&self, ranked: &[T], n: usize, rng: &mut R) -> Vec<T> {
        let roll: f64 = rng.gen();
        if roll >= self.factor || n == 0 {
            return ranked.iter().take(n).cloned().collect();
        }

        let top = n / 2;
        let wanted = n - top;
        let head_end = n.min(ranked.len());

        let mut picks: Vec<usize> = (0..top.min(ranked.len())).collect();

        // Ranks n.. first; backfill from ranks n/2..n when those run short
        let tail: Vec<usize> = (head_end..ranked.len()).collect();
        if tail.len() >= wanted {
            picks.extend(index::sample(rng, tail.len(), wanted).into_iter().map(|i| tail[i]));
        } else {
            picks.extend(tail.iter().copied());
            let backfill: Vec<usize> = (top..head_end).collect();
            let missing = (wanted - tail.len()).min(backfill.len());
            picks.extend(
                index::sample(rng, backfill.len(), missing)
                    .into_iter()
                    .map(|i| backfill[i]),
            );
        }

        picks.shuffle(rng);
        picks.into_iter().map(|i| ranked[i].clone()).collect()
    }
}
