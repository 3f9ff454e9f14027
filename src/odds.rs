use crate::error::{HuntOddsError, Result};

/// Share of issued licenses that go to the general draw pool.
pub const DRAW_FACTOR: f64 = 0.84;

/// Applicant total substituted for a reported zero so odds stay finite.
pub const ZERO_APPLICANT_SENTINEL: u32 = 1_000_000;

/// Draw odds as a fraction: `round(n_licenses * 0.84) / r_tot`.
///
/// The intermediate product is rounded half-to-even. Callers are expected to
/// substitute [`ZERO_APPLICANT_SENTINEL`] before calling; a zero `r_tot` that
/// still reaches here fails with [`HuntOddsError::DivisionGuard`].
pub fn chance(n_licenses: u32, r_tot: u32) -> Result<f64> {
    if r_tot == 0 {
        return Err(HuntOddsError::DivisionGuard);
    }
    let drawn = (f64::from(n_licenses) * DRAW_FACTOR).round_ties_even();
    Ok(drawn / f64::from(r_tot))
}

/// Draw odds as a percentage, the form persisted in `huntOdds`.
///
/// Unlike [`chance`] the drawn-license product is not rounded, so hunts with
/// few licenses still rank by their exact ratio.
pub fn hunt_odds(n_licenses: u32, r_tot: u32) -> Result<f64> {
    if r_tot == 0 {
        return Err(HuntOddsError::DivisionGuard);
    }
    Ok(f64::from(n_licenses) * DRAW_FACTOR / f64::from(r_tot) * 100.0)
}

/// Replaces a zero applicant total with the sentinel.
pub fn guard_applicants(r_tot: u32) -> u32 {
    if r_tot == 0 {
        ZERO_APPLICANT_SENTINEL
    } else {
        r_tot
    }
}

pub fn describe_chance(hunt_code: &str, chance: f64) -> String {
    format!("Chance of getting {}: {:.2}%", hunt_code, chance * 100.0)
}
