//! Match-history aggregation.
//!
//! Pure functions turning raw match records into [`ProcessedStats`]: totals,
//! streaks, per-champion and per-month aggregation, tilt analysis, peak game
//! and role distribution. No I/O here.

use crate::riot::MatchRecord;
use crate::types::{
    ChampionStat, MonthlyPerformance, PeakMoment, ProcessedMatch, ProcessedStats, RoleStats,
    StreakData, TiltAnalysis,
};
use chrono::{TimeZone, Utc};

/// Per-match KDA. Deaths count at least one so a deathless game stays
/// finite.
pub fn kda(kills: u32, deaths: u32, assists: u32) -> f64 {
    f64::from(kills + assists) / f64::from(deaths.max(1))
}

/// Flattens raw match records into the player's own view of each game.
/// Records that do not list the player are dropped.
pub fn extract_player_matches(matches: &[MatchRecord], puuid: &str) -> Vec<ProcessedMatch> {
    matches
        .iter()
        .filter_map(|record| {
            let participant = record.info.participants.iter().find(|p| p.puuid == puuid)?;
            Some(ProcessedMatch {
                match_id: record.metadata.match_id.clone(),
                game_date: record.info.game_creation,
                win: participant.win,
                champion_name: participant.champion_name.clone(),
                kills: participant.kills,
                deaths: participant.deaths,
                assists: participant.assists,
                kda: kda(participant.kills, participant.deaths, participant.assists),
                vision_score: participant.vision_score,
                gold_earned: participant.gold_earned,
                total_damage: participant.total_damage_dealt_to_champions,
                position: participant.team_position.clone(),
                game_duration: record.info.game_duration,
            })
        })
        .collect()
}

/// The full aggregation pipeline over raw match records.
pub fn process_match_data(matches: &[MatchRecord], puuid: &str) -> ProcessedStats {
    let player = extract_player_matches(matches, puuid);
    summarize(&player)
}

/// Aggregates already-flattened matches. Streak and tilt figures follow the
/// order of the slice.
pub fn summarize(player: &[ProcessedMatch]) -> ProcessedStats {
    let total = player.len() as u32;
    let wins = player.iter().filter(|m| m.win).count() as u32;
    let losses = total - wins;
    let kda_average = average(player.iter().map(|m| m.kda), total);
    let vision_score = average(player.iter().map(|m| m.vision_score), total);

    ProcessedStats {
        wins,
        losses,
        win_rate: percent(wins, total),
        streaks: streaks(player),
        total_games: total,
        kda_average,
        vision_score,
        tilt_patterns: tilt_patterns(player),
        champion_stats: champion_stats(player),
        peak_performance: peak_moment(player),
        role_distribution: role_distribution(player),
        performance_timeline: monthly_performance(player),
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

fn average(values: impl Iterator<Item = f64>, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        values.sum::<f64>() / f64::from(count)
    }
}

fn champion_stats(player: &[ProcessedMatch]) -> Vec<ChampionStat> {
    let mut champions: Vec<ChampionStat> = Vec::new();
    for m in player {
        let index = match champions.iter().position(|c| c.name == m.champion_name) {
            Some(i) => i,
            None => {
                champions.push(blank_champion(&m.champion_name));
                champions.len() - 1
            }
        };
        let stat = &mut champions[index];
        stat.games += 1;
        if m.win {
            stat.wins += 1;
        }
        stat.kda += m.kda;
        stat.total_kills += m.kills;
        stat.total_deaths += m.deaths;
        stat.total_assists += m.assists;
    }
    for stat in &mut champions {
        stat.losses = stat.games - stat.wins;
        stat.win_rate = percent(stat.wins, stat.games);
        stat.avg_kda = stat.kda / f64::from(stat.games);
    }
    // Most played first; ties keep first-seen order.
    champions.sort_by(|a, b| b.games.cmp(&a.games));
    champions
}

fn blank_champion(name: &str) -> ChampionStat {
    ChampionStat {
        name: name.to_string(),
        games: 0,
        wins: 0,
        losses: 0,
        win_rate: 0.0,
        kda: 0.0,
        avg_kda: 0.0,
        total_kills: 0,
        total_deaths: 0,
        total_assists: 0,
    }
}

fn monthly_performance(player: &[ProcessedMatch]) -> Vec<MonthlyPerformance> {
    // (month, games, wins, kda sum)
    let mut months: Vec<(String, u32, u32, f64)> = Vec::new();
    for m in player {
        let Some(date) = Utc.timestamp_millis_opt(m.game_date).single() else {
            continue;
        };
        let month = date.format("%Y-%m").to_string();
        let index = match months.iter().position(|(key, ..)| *key == month) {
            Some(i) => i,
            None => {
                months.push((month, 0, 0, 0.0));
                months.len() - 1
            }
        };
        let entry = &mut months[index];
        entry.1 += 1;
        if m.win {
            entry.2 += 1;
        }
        entry.3 += m.kda;
    }
    let mut timeline: Vec<MonthlyPerformance> = months
        .into_iter()
        .map(|(month, games, wins, kda_sum)| MonthlyPerformance {
            month,
            games,
            wins,
            win_rate: percent(wins, games),
            avg_kda: kda_sum / f64::from(games),
        })
        .collect();
    timeline.sort_by(|a, b| a.month.cmp(&b.month));
    timeline
}

fn streaks(player: &[ProcessedMatch]) -> StreakData {
    let mut data = StreakData::default();
    let mut win_run = 0;
    let mut loss_run = 0;
    for m in player {
        if m.win {
            win_run += 1;
            loss_run = 0;
            data.longest_win_streak = data.longest_win_streak.max(win_run);
        } else {
            loss_run += 1;
            win_run = 0;
            data.longest_loss_streak = data.longest_loss_streak.max(loss_run);
        }
    }
    data
}

fn tilt_patterns(player: &[ProcessedMatch]) -> TiltAnalysis {
    let mut games_after_loss = 0;
    let mut wins_after_loss = 0;
    let mut kda_after_loss = 0.0;
    for pair in player.windows(2) {
        if !pair[0].win {
            games_after_loss += 1;
            if pair[1].win {
                wins_after_loss += 1;
            }
            kda_after_loss += pair[1].kda;
        }
    }
    TiltAnalysis {
        tilt_recovery_rate: percent(wins_after_loss, games_after_loss),
        games_after_loss,
        wins_after_loss,
        avg_performance_after_loss: if games_after_loss == 0 {
            0.0
        } else {
            kda_after_loss / f64::from(games_after_loss)
        },
    }
}

fn peak_moment(player: &[ProcessedMatch]) -> Option<PeakMoment> {
    let mut best: Option<&ProcessedMatch> = None;
    for m in player {
        let replace = match best {
            Some(b) => m.kda > b.kda,
            None => true,
        };
        if replace {
            best = Some(m);
        }
    }
    best.map(|m| PeakMoment {
        champion: m.champion_name.clone(),
        kda: m.kda,
        date: Utc
            .timestamp_millis_opt(m.game_date)
            .single()
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        kills: m.kills,
        deaths: m.deaths,
        assists: m.assists,
    })
}

fn role_distribution(player: &[ProcessedMatch]) -> RoleStats {
    let mut roles = RoleStats::default();
    for m in player {
        match m.position.as_str() {
            "TOP" => roles.top += 1,
            "JUNGLE" => roles.jungle += 1,
            "MIDDLE" => roles.middle += 1,
            "BOTTOM" => roles.bottom += 1,
            "UTILITY" => roles.utility += 1,
            _ => {}
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kda_treats_deathless_games_as_one_death() {
        assert_eq!(kda(10, 0, 5), 15.0);
        assert_eq!(kda(6, 3, 9), 5.0);
    }

    #[test]
    fn percent_of_nothing_is_zero() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
