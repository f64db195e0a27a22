use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{ChanceResult, ChanceSummary, Grade, Scheme, StudentRecord, SuccessChance};

pub fn summarize_by_chance(results: &[ChanceResult]) -> Vec<ChanceSummary> {
    let mut map: std::collections::HashMap<SuccessChance, usize> =
        std::collections::HashMap::new();

    for result in results {
        *map.entry(result.chance).or_insert(0) += 1;
    }

    let mut summaries: Vec<ChanceSummary> = map
        .into_iter()
        .map(|(chance, count)| ChanceSummary { chance, count })
        .collect();

    summaries.sort_by(|a, b| {
        b.count.cmp(&a.count).then_with(|| {
            let rank_a = a.chance.rank().map_or(-1, i32::from);
            let rank_b = b.chance.rank().map_or(-1, i32::from);
            rank_b.cmp(&rank_a)
        })
    });
    summaries
}

fn percentile_line(label: &str, value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{label}: {value:.0}"),
        None => format!("{label}: not yet collected"),
    }
}

fn grade_line(label: &str, value: Option<Grade>) -> String {
    match value {
        Some(grade) => format!("{label}: {grade}"),
        None => format!("{label}: not yet collected"),
    }
}

fn result_line(result: &ChanceResult) -> String {
    match result.points {
        Some(points) => format!(
            "- {} ({}): {} with {points:.0} points",
            result.program_name, result.school_name, result.chance
        ),
        None => format!(
            "- {} ({}): {}",
            result.program_name, result.school_name, result.chance
        ),
    }
}

pub fn build_report(
    student: &StudentRecord,
    results: &[ChanceResult],
    generated_on: NaiveDate,
) -> String {
    let summaries = summarize_by_chance(results);

    let mut output = String::new();
    let _ = writeln!(output, "# Admission Chances Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) on {}",
        student.full_name, student.email, generated_on
    );
    let _ = writeln!(output, "Profile last updated {}", student.updated_at);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Profile");
    let _ = writeln!(
        output,
        "- {}",
        percentile_line("Math percentile", student.data.hsat_percentile_math)
    );
    let _ = writeln!(
        output,
        "- {}",
        percentile_line("Reading percentile", student.data.hsat_percentile_read)
    );
    let _ = writeln!(output, "- {}", grade_line("Math grade", student.data.grade_math));
    let _ = writeln!(output, "- {}", grade_line("Reading grade", student.data.grade_read));
    let _ = writeln!(output, "- {}", grade_line("Science grade", student.data.grade_sci));
    let _ = writeln!(
        output,
        "- {}",
        grade_line("Social studies grade", student.data.grade_soc_studies)
    );
    match student.data.tier {
        Some(tier) => {
            let _ = writeln!(output, "- Tier: {tier}");
        }
        None => {
            let _ = writeln!(output, "- Tier: not yet collected");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Chance Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No programs on file.");
    } else {
        for summary in summaries.iter() {
            let programs = if summary.count == 1 { "program" } else { "programs" };
            let _ = writeln!(output, "- {}: {} {programs}", summary.chance, summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Selective Enrollment Programs");
    let se_results: Vec<&ChanceResult> =
        results.iter().filter(|r| r.scheme == Scheme::Se).collect();
    if se_results.is_empty() {
        let _ = writeln!(output, "No selective enrollment programs on file.");
    } else {
        for result in se_results {
            let _ = writeln!(output, "{}", result_line(result));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## IB Programs");
    let ib_results: Vec<&ChanceResult> =
        results.iter().filter(|r| r.scheme == Scheme::Ib).collect();
    if ib_results.is_empty() {
        let _ = writeln!(output, "No IB programs on file.");
    } else {
        for result in ib_results {
            let _ = writeln!(output, "{}", result_line(result));
        }
    }

    let undetermined: Vec<&ChanceResult> = results
        .iter()
        .filter(|r| r.chance == SuccessChance::NotImplemented)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs More Data");

    if undetermined.is_empty() {
        let _ = writeln!(output, "Every program produced an estimate.");
    } else {
        for result in undetermined {
            let _ = writeln!(
                output,
                "- {} ({}) [{}]",
                result.program_name, result.school_name, result.scheme
            );
        }
    }

    output
}
