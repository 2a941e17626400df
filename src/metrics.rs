//! Dashboard aggregations over a snapshot of the lead store.
//!
//! Every function here is pure: callers pass the leads (and "today" where a
//! window is involved), so the same code serves both store backends.

use crate::models::{
    ChartSeries, DailyMetric, DashboardSummary, FunnelResponse, FunnelStage, FunnelState, Lead,
    LeadTemperature, MortgageSplit,
};
use bigdecimal::BigDecimal;
use chrono::{Days, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Trailing window for the conversations-per-day chart.
pub const DAILY_WINDOW_DAYS: u64 = 30;

/// Half-open income range `[lower, upper)`; `upper == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeBracket {
    pub label: &'static str,
    pub lower: i64,
    pub upper: Option<i64>,
}

impl IncomeBracket {
    pub fn contains(&self, value: &BigDecimal) -> bool {
        *value >= BigDecimal::from(self.lower)
            && self.upper.map_or(true, |upper| *value < BigDecimal::from(upper))
    }
}

pub const INCOME_BRACKETS: [IncomeBracket; 7] = [
    IncomeBracket { label: "0-500", lower: 0, upper: Some(500) },
    IncomeBracket { label: "500-700", lower: 500, upper: Some(700) },
    IncomeBracket { label: "700-1000", lower: 700, upper: Some(1000) },
    IncomeBracket { label: "1000-1200", lower: 1000, upper: Some(1200) },
    IncomeBracket { label: "1200-1500", lower: 1200, upper: Some(1500) },
    IncomeBracket { label: "1500-2000", lower: 1500, upper: Some(2000) },
    IncomeBracket { label: "2000+", lower: 2000, upper: None },
];

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

fn mean_duration<'a>(leads: impl Iterator<Item = &'a Lead>) -> f64 {
    let durations: Vec<f64> = leads
        .filter(|l| l.has_both_timestamps())
        .map(Lead::duracion_minutos)
        .collect();
    if durations.is_empty() {
        return 0.0;
    }
    round1(durations.iter().sum::<f64>() / durations.len() as f64)
}

/// Leads started per day over `[today - 30 days, today]`, ascending, zero days omitted.
pub fn daily_conversations(leads: &[Lead], today: NaiveDate) -> ChartSeries {
    let start = today
        .checked_sub_days(Days::new(DAILY_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN);

    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for date in leads
        .iter()
        .filter_map(|l| l.fecha_hilo)
        .map(|ts| ts.date_naive())
        .filter(|d| *d >= start && *d <= today)
    {
        *per_day.entry(date).or_insert(0) += 1;
    }

    ChartSeries {
        labels: per_day.keys().map(|d| d.format("%d/%m").to_string()).collect(),
        data: per_day.into_values().collect(),
    }
}

/// Lead counts per fixed income bracket, in bracket order.
pub fn income_distribution(leads: &[Lead]) -> ChartSeries {
    let data = INCOME_BRACKETS
        .iter()
        .map(|bracket| {
            leads
                .iter()
                .filter_map(|l| l.ingreso_bruto.as_ref())
                .filter(|ingreso| bracket.contains(ingreso))
                .count() as i64
        })
        .collect();

    ChartSeries {
        labels: INCOME_BRACKETS.iter().map(|b| b.label.to_string()).collect(),
        data,
    }
}

pub fn mortgage_split(leads: &[Lead]) -> MortgageSplit {
    let con_hipoteca = leads.iter().filter(|l| l.hipoteca_vigente).count() as i64;
    MortgageSplit {
        con_hipoteca,
        sin_hipoteca: leads.len() as i64 - con_hipoteca,
    }
}

/// Exact-match counts for the seven funnel states, zero counts included.
pub fn funnel_counts(leads: &[Lead]) -> FunnelResponse {
    FunnelResponse {
        embudo: FunnelState::ALL
            .iter()
            .map(|state| FunnelStage {
                estado: state.as_str().to_string(),
                cantidad: leads.iter().filter(|l| l.is_in_state(*state)).count() as i64,
            })
            .collect(),
    }
}

pub fn dashboard_summary(leads: &[Lead]) -> DashboardSummary {
    let total = leads.len();
    let interacciones_promedio = if total == 0 {
        0.0
    } else {
        let sum: i64 = leads.iter().map(|l| l.numero_interacciones as i64).sum();
        round1(sum as f64 / total as f64)
    };
    let aceptados = leads
        .iter()
        .filter(|l| l.is_in_state(FunnelState::AceptaDerivacion))
        .count();

    DashboardSummary {
        total_conversaciones: total as i64,
        tiempo_promedio: mean_duration(leads.iter()),
        interacciones_promedio,
        eficiencia: percentage(aceptados, total),
    }
}

/// Daily metric for the leads whose thread started on `fecha`.
pub fn daily_snapshot(leads: &[Lead], fecha: NaiveDate) -> DailyMetric {
    let of_day: Vec<&Lead> = leads
        .iter()
        .filter(|l| l.fecha_hilo.map(|ts| ts.date_naive()) == Some(fecha))
        .collect();

    let total = of_day.len();
    let now = Utc::now();

    DailyMetric {
        fecha,
        total_conversaciones: total as i32,
        conversaciones_completadas: count_where(&of_day, |l| {
            l.is_in_state(FunnelState::Finalizado)
        }) as i32,
        tiempo_promedio: mean_duration(of_day.iter().copied()),
        tasa_conversion: percentage(
            count_where(&of_day, |l| l.is_in_state(FunnelState::AceptaDerivacion)),
            total,
        ),
        leads_frios: count_where(&of_day, |l| l.tipo_lead == LeadTemperature::Frio) as i32,
        leads_tibios: count_where(&of_day, |l| l.tipo_lead == LeadTemperature::Tibio) as i32,
        leads_calientes: count_where(&of_day, |l| l.tipo_lead == LeadTemperature::Caliente)
            as i32,
        created_at: now,
        updated_at: now,
    }
}

fn count_where(leads: &[&Lead], pred: impl Fn(&Lead) -> bool) -> usize {
    leads.iter().filter(|l| pred(l)).count()
}
