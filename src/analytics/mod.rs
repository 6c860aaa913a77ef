pub mod benchmark;
pub mod bs_analytic;
