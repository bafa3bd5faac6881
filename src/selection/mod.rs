pub mod mmr;
