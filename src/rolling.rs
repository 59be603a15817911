//! Recent-form metrics: fixed-window means and EWMs of per-event observations.

use serde::{Deserialize, Serialize};

use crate::history::EntityHistory;
use crate::records::Observations;
use crate::temporal::{ewm_mean, ewm_ratio, rolling_mean, rolling_ratio};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingFeatures {
    pub roll_sig_str_pct: Option<f64>,
    pub roll_td_pct: Option<f64>,
    pub roll_kd: Option<f64>,
    pub roll_ctrl_s: Option<f64>,
    pub roll_sig_str_landed: Option<f64>,
    pub roll_sig_str_att: Option<f64>,
    pub roll_total_str_landed: Option<f64>,
    pub roll_total_str_att: Option<f64>,
    pub roll_td_landed: Option<f64>,
    pub roll_td_att: Option<f64>,
    pub ewa_sig_str_pct: Option<f64>,
    pub ewa_td_pct: Option<f64>,
    pub ewa_kd: Option<f64>,
    pub ewa_ctrl_s: Option<f64>,
}

impl RollingFeatures {
    pub const NAMES: [&'static str; 14] = [
        "roll_sig_str_pct",
        "roll_td_pct",
        "roll_kd",
        "roll_ctrl_s",
        "roll_sig_str_landed",
        "roll_sig_str_att",
        "roll_total_str_landed",
        "roll_total_str_att",
        "roll_td_landed",
        "roll_td_att",
        "ewa_sig_str_pct",
        "ewa_td_pct",
        "ewa_kd",
        "ewa_ctrl_s",
    ];

    pub fn values(&self) -> [Option<f64>; 14] {
        [
            self.roll_sig_str_pct,
            self.roll_td_pct,
            self.roll_kd,
            self.roll_ctrl_s,
            self.roll_sig_str_landed,
            self.roll_sig_str_att,
            self.roll_total_str_landed,
            self.roll_total_str_att,
            self.roll_td_landed,
            self.roll_td_att,
            self.ewa_sig_str_pct,
            self.ewa_td_pct,
            self.ewa_kd,
            self.ewa_ctrl_s,
        ]
    }
}

fn column(history: &EntityHistory, pick: fn(&Observations) -> f64) -> Vec<Option<f64>> {
    history
        .entries
        .iter()
        .map(|p| p.observations.as_ref().map(pick))
        .collect()
}

/// Recent-form features for every position of `history` plus the pending state.
pub fn rolling_features(history: &EntityHistory, window: usize, alpha: f64) -> Vec<RollingFeatures> {
    let kd = column(history, |o| o.knockdowns);
    let ctrl = column(history, |o| o.ctrl_seconds);
    let sig_landed = column(history, |o| o.sig_str_landed);
    let sig_att = column(history, |o| o.sig_str_attempted);
    let total_landed = column(history, |o| o.total_str_landed);
    let total_att = column(history, |o| o.total_str_attempted);
    let td_landed = column(history, |o| o.td_landed);
    let td_att = column(history, |o| o.td_attempted);

    let roll_sig_str_pct = rolling_ratio(&sig_landed, &sig_att, window);
    let roll_td_pct = rolling_ratio(&td_landed, &td_att, window);
    let roll_kd = rolling_mean(&kd, window);
    let roll_ctrl_s = rolling_mean(&ctrl, window);
    let roll_sig_str_landed = rolling_mean(&sig_landed, window);
    let roll_sig_str_att = rolling_mean(&sig_att, window);
    let roll_total_str_landed = rolling_mean(&total_landed, window);
    let roll_total_str_att = rolling_mean(&total_att, window);
    let roll_td_landed = rolling_mean(&td_landed, window);
    let roll_td_att = rolling_mean(&td_att, window);
    let ewa_sig_str_pct = ewm_ratio(&sig_landed, &sig_att, alpha);
    let ewa_td_pct = ewm_ratio(&td_landed, &td_att, alpha);
    let ewa_kd = ewm_mean(&kd, alpha);
    let ewa_ctrl_s = ewm_mean(&ctrl, alpha);

    (0..=history.len())
        .map(|i| RollingFeatures {
            roll_sig_str_pct: roll_sig_str_pct[i],
            roll_td_pct: roll_td_pct[i],
            roll_kd: roll_kd[i],
            roll_ctrl_s: roll_ctrl_s[i],
            roll_sig_str_landed: roll_sig_str_landed[i],
            roll_sig_str_att: roll_sig_str_att[i],
            roll_total_str_landed: roll_total_str_landed[i],
            roll_total_str_att: roll_total_str_att[i],
            roll_td_landed: roll_td_landed[i],
            roll_td_att: roll_td_att[i],
            ewa_sig_str_pct: ewa_sig_str_pct[i],
            ewa_td_pct: ewa_td_pct[i],
            ewa_kd: ewa_kd[i],
            ewa_ctrl_s: ewa_ctrl_s[i],
        })
        .collect()
}
