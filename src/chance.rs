use anyhow::Context;

use crate::models::{
    ChanceResult, CutoffScores, Grade, IbCutoffDictionary, Program, ProgramRecord, Scheme,
    SeCutoffDictionary, StudentData, StudentRecord, SuccessChance,
};

const HSAT_SCORE_CONSTANT: f64 = 2.2727;
const ATTEND_BOUND_BONUS_POINTS: f64 = 50.0;

pub fn grade_points(grade: Grade) -> f64 {
    match grade {
        Grade::A => 112.5,
        Grade::B => 75.0,
        Grade::C => 38.0,
        Grade::D => 0.0,
        Grade::F => 0.0,
    }
}

/// Shared point formula: each percentile term is rounded on its own before
/// the terms are summed.
fn academic_points(student: &StudentData) -> Option<f64> {
    let pct_math = student.hsat_percentile_math?;
    let pct_read = student.hsat_percentile_read?;
    let grade_math = student.grade_math?;
    let grade_read = student.grade_read?;
    let grade_sci = student.grade_sci?;
    let grade_soc_studies = student.grade_soc_studies?;

    let math_points = (pct_math * HSAT_SCORE_CONSTANT).round();
    let read_points = (pct_read * HSAT_SCORE_CONSTANT).round();

    Some(
        math_points
            + read_points
            + grade_points(grade_math)
            + grade_points(grade_read)
            + grade_points(grade_sci)
            + grade_points(grade_soc_studies),
    )
}

/// Point total for the SE scheme, or `None` while any required input is
/// still missing.
pub fn se_points(student: &StudentData) -> Option<f64> {
    academic_points(student)
}

/// Point total for the IB scheme: the shared formula plus a flat bonus when
/// the student lives inside the program school's attendance boundary.
pub fn ib_points<F>(student: &StudentData, program: &Program, in_attend_bound: F) -> Option<f64>
where
    F: Fn(&StudentData, &Program) -> bool,
{
    let base = academic_points(student)?;
    let bonus = if in_attend_bound(student, program) {
        ATTEND_BOUND_BONUS_POINTS
    } else {
        0.0
    };
    Some(base + bonus)
}

/// Ties at a boundary land on the higher classification. Callers screen for
/// non-finite inputs first.
pub fn classify(points: f64, cutoff: &CutoffScores) -> SuccessChance {
    if points >= cutoff.max {
        SuccessChance::Certain
    } else if points >= cutoff.avg {
        SuccessChance::Likely
    } else if points >= cutoff.min {
        SuccessChance::Uncertain
    } else {
        SuccessChance::None
    }
}

/// Only the applicant's own tier row is consulted; clearing that row is
/// taken as sufficient. A missing program row or an untiered student is
/// recoverable.
pub fn se_cutoff_lookup(
    cutoffs: &SeCutoffDictionary,
    student: &StudentData,
    program: &Program,
) -> Option<CutoffScores> {
    let Some(tiers) = cutoffs.get(&program.id) else {
        eprintln!(
            "no cutoff scores for {} (id {})",
            program.program_name, program.id
        );
        return None;
    };
    let tier = student.tier?;
    Some(tiers.for_tier(tier))
}

/// A program absent from the IB cutoff table is a data-integrity gap the
/// caller must fix, so it aborts the evaluation.
pub fn ib_cutoff_lookup(
    cutoffs: &IbCutoffDictionary,
    program: &Program,
) -> anyhow::Result<CutoffScores> {
    cutoffs.get(&program.id).copied().with_context(|| {
        format!(
            "school {} (program id {}) missing from IB cutoff scores",
            program.school_name, program.id
        )
    })
}

/// Combines a point formula and a cutoff lookup into a requirement function.
/// Missing inputs, an unresolvable cutoff, and non-finite values all degrade
/// to `NotImplemented`; only an `Err` from the lookup propagates.
pub fn point_system<P, L>(
    point_calc: P,
    cutoff_lookup: L,
) -> impl Fn(&StudentData, &Program) -> anyhow::Result<SuccessChance>
where
    P: Fn(&StudentData, &Program) -> Option<f64>,
    L: Fn(&StudentData, &Program) -> anyhow::Result<Option<CutoffScores>>,
{
    move |student, program| {
        let points = match point_calc(student, program) {
            Some(points) => points,
            None => return Ok(SuccessChance::NotImplemented),
        };
        let cutoff = match cutoff_lookup(student, program)? {
            Some(cutoff) => cutoff,
            None => return Ok(SuccessChance::NotImplemented),
        };
        if !points.is_finite() {
            eprintln!("non-finite point total for program {}", program.id);
            return Ok(SuccessChance::NotImplemented);
        }
        if !(cutoff.min.is_finite() && cutoff.avg.is_finite() && cutoff.max.is_finite()) {
            eprintln!("non-finite cutoff scores for program {}", program.id);
            return Ok(SuccessChance::NotImplemented);
        }
        Ok(classify(points, &cutoff))
    }
}

pub fn se_requirement(
    cutoffs: &SeCutoffDictionary,
) -> impl Fn(&StudentData, &Program) -> anyhow::Result<SuccessChance> + '_ {
    point_system(
        |student: &StudentData, _program: &Program| se_points(student),
        move |student: &StudentData, program: &Program| {
            Ok(se_cutoff_lookup(cutoffs, student, program))
        },
    )
}

pub fn ib_requirement<'a, F>(
    cutoffs: &'a IbCutoffDictionary,
    in_attend_bound: F,
) -> impl Fn(&StudentData, &Program) -> anyhow::Result<SuccessChance> + 'a
where
    F: Fn(&StudentData, &Program) -> bool + 'a,
{
    point_system(
        move |student: &StudentData, program: &Program| {
            ib_points(student, program, &in_attend_bound)
        },
        move |_student: &StudentData, program: &Program| {
            ib_cutoff_lookup(cutoffs, program).map(Some)
        },
    )
}

/// Evaluates one student against every program, strongest chances first with
/// undetermined results last.
pub fn evaluate_programs(
    student: &StudentRecord,
    programs: &[ProgramRecord],
    se_cutoffs: &SeCutoffDictionary,
    ib_cutoffs: &IbCutoffDictionary,
) -> anyhow::Result<Vec<ChanceResult>> {
    // A school with no boundary rows on file can never contain the student,
    // so the bonus is deterministically withheld.
    let in_attend_bound = |_student: &StudentData, program: &Program| {
        student.boundary_schools.contains(&program.school_id)
    };
    let se_req = se_requirement(se_cutoffs);
    let ib_req = ib_requirement(ib_cutoffs, &in_attend_bound);

    let mut results = Vec::with_capacity(programs.len());
    for record in programs {
        let (points, chance) = match record.scheme {
            Scheme::Se => (
                se_points(&student.data),
                se_req(&student.data, &record.program)?,
            ),
            Scheme::Ib => (
                ib_points(&student.data, &record.program, &in_attend_bound),
                ib_req(&student.data, &record.program)?,
            ),
        };
        results.push(ChanceResult {
            program_id: record.program.id.clone(),
            program_name: record.program.program_name.clone(),
            school_name: record.program.school_name.clone(),
            scheme: record.scheme,
            points,
            chance,
        });
    }

    results.sort_by(|a, b| {
        let rank_a = a.chance.rank().map_or(-1, i32::from);
        let rank_b = b.chance.rank().map_or(-1, i32::from);
        rank_b
            .cmp(&rank_a)
            .then_with(|| a.program_name.cmp(&b.program_name))
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tier, TieredCutoffs};
    use chrono::NaiveDate;

    fn full_student() -> StudentData {
        StudentData {
            hsat_percentile_math: Some(100.0),
            hsat_percentile_read: Some(100.0),
            grade_math: Some(Grade::A),
            grade_read: Some(Grade::A),
            grade_sci: Some(Grade::A),
            grade_soc_studies: Some(Grade::A),
            tier: Some(Tier::Tier1),
        }
    }

    fn sample_program(id: &str) -> Program {
        Program {
            id: id.to_string(),
            program_name: format!("{id} program"),
            school_name: format!("{id} school"),
            school_id: format!("{id}-school"),
        }
    }

    fn uniform_tiers(cutoff: CutoffScores) -> TieredCutoffs {
        TieredCutoffs {
            tier1: cutoff,
            tier2: cutoff,
            tier3: cutoff,
            tier4: cutoff,
        }
    }

    fn sample_record(data: StudentData, bounds: &[&str]) -> StudentRecord {
        StudentRecord {
            full_name: "Avery Lee".to_string(),
            email: "avery.lee@example.com".to_string(),
            updated_at: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            data,
            boundary_schools: bounds.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn grade_point_table_is_fixed() {
        assert_eq!(grade_points(Grade::A), 112.5);
        assert_eq!(grade_points(Grade::B), 75.0);
        assert_eq!(grade_points(Grade::C), 38.0);
        assert_eq!(grade_points(Grade::D), 0.0);
        assert_eq!(grade_points(Grade::F), 0.0);
    }

    #[test]
    fn perfect_profile_scores_904() {
        // round(100 x 2.2727) = 227 per percentile, 112.5 per grade
        assert_eq!(se_points(&full_student()), Some(904.0));
    }

    #[test]
    fn any_missing_input_leaves_points_undetermined() {
        let clears: Vec<fn(&mut StudentData)> = vec![
            |s| s.hsat_percentile_math = None,
            |s| s.hsat_percentile_read = None,
            |s| s.grade_math = None,
            |s| s.grade_read = None,
            |s| s.grade_sci = None,
            |s| s.grade_soc_studies = None,
        ];
        for clear in clears {
            let mut student = full_student();
            clear(&mut student);
            assert_eq!(se_points(&student), None);
            let in_bound = |_: &StudentData, _: &Program| true;
            assert_eq!(ib_points(&student, &sample_program("ib-x"), in_bound), None);
        }
    }

    #[test]
    fn attendance_bonus_adds_exactly_fifty_points() {
        let student = full_student();
        let program = sample_program("ib-x");
        let base = se_points(&student).unwrap();
        let inside = ib_points(&student, &program, |_: &StudentData, _: &Program| true);
        let outside = ib_points(&student, &program, |_: &StudentData, _: &Program| false);
        assert_eq!(inside, Some(base + 50.0));
        assert_eq!(outside, Some(base));
    }

    #[test]
    fn classification_boundaries_favor_the_higher_outcome() {
        let cutoff = CutoffScores { min: 10.0, avg: 20.0, max: 30.0 };
        assert_eq!(classify(30.0, &cutoff), SuccessChance::Certain);
        assert_eq!(classify(29.9, &cutoff), SuccessChance::Likely);
        assert_eq!(classify(20.0, &cutoff), SuccessChance::Likely);
        assert_eq!(classify(19.9, &cutoff), SuccessChance::Uncertain);
        assert_eq!(classify(10.0, &cutoff), SuccessChance::Uncertain);
        assert_eq!(classify(9.9, &cutoff), SuccessChance::None);
    }

    #[test]
    fn se_lookup_uses_the_applicants_own_tier() {
        let mut cutoffs = SeCutoffDictionary::new();
        cutoffs.insert(
            "se-x".to_string(),
            TieredCutoffs {
                tier1: CutoffScores { min: 700.0, avg: 800.0, max: 880.0 },
                tier2: CutoffScores { min: 720.0, avg: 820.0, max: 890.0 },
                tier3: CutoffScores { min: 740.0, avg: 840.0, max: 900.0 },
                tier4: CutoffScores { min: 760.0, avg: 860.0, max: 910.0 },
            },
        );
        let program = sample_program("se-x");

        let mut student = full_student();
        student.tier = Some(Tier::Tier3);
        let cutoff = se_cutoff_lookup(&cutoffs, &student, &program).unwrap();
        assert_eq!(cutoff.min, 740.0);
    }

    #[test]
    fn se_requirement_degrades_when_program_or_tier_is_missing() {
        let cutoffs = SeCutoffDictionary::new();
        let requirement = se_requirement(&cutoffs);
        let outcome = requirement(&full_student(), &sample_program("se-unknown")).unwrap();
        assert_eq!(outcome, SuccessChance::NotImplemented);

        let mut cutoffs = SeCutoffDictionary::new();
        cutoffs.insert(
            "se-x".to_string(),
            uniform_tiers(CutoffScores { min: 700.0, avg: 800.0, max: 900.0 }),
        );
        let requirement = se_requirement(&cutoffs);
        let mut untiered = full_student();
        untiered.tier = None;
        let outcome = requirement(&untiered, &sample_program("se-x")).unwrap();
        assert_eq!(outcome, SuccessChance::NotImplemented);
    }

    #[test]
    fn ib_requirement_fails_hard_on_a_missing_cutoff_row() {
        let cutoffs = IbCutoffDictionary::new();
        let requirement = ib_requirement(&cutoffs, |_: &StudentData, _: &Program| false);
        let err = requirement(&full_student(), &sample_program("ib-unknown")).unwrap_err();
        assert!(err.to_string().contains("missing from IB cutoff scores"));
    }

    #[test]
    fn missing_inputs_short_circuit_before_the_ib_cutoff_lookup() {
        let cutoffs = IbCutoffDictionary::new();
        let requirement = ib_requirement(&cutoffs, |_: &StudentData, _: &Program| false);
        let mut student = full_student();
        student.grade_sci = None;
        let outcome = requirement(&student, &sample_program("ib-unknown")).unwrap();
        assert_eq!(outcome, SuccessChance::NotImplemented);
    }

    #[test]
    fn non_finite_cutoffs_degrade_to_undetermined() {
        let mut cutoffs = SeCutoffDictionary::new();
        cutoffs.insert(
            "se-x".to_string(),
            uniform_tiers(CutoffScores { min: 700.0, avg: f64::NAN, max: 900.0 }),
        );
        let requirement = se_requirement(&cutoffs);
        let outcome = requirement(&full_student(), &sample_program("se-x")).unwrap();
        assert_eq!(outcome, SuccessChance::NotImplemented);
    }

    #[test]
    fn requirement_functions_are_deterministic() {
        let mut cutoffs = SeCutoffDictionary::new();
        cutoffs.insert(
            "se-x".to_string(),
            uniform_tiers(CutoffScores { min: 700.0, avg: 800.0, max: 900.0 }),
        );
        let requirement = se_requirement(&cutoffs);
        let student = full_student();
        let program = sample_program("se-x");
        let first = requirement(&student, &program).unwrap();
        let second = requirement(&student, &program).unwrap();
        assert_eq!(first, SuccessChance::Certain);
        assert_eq!(first, second);
    }

    #[test]
    fn evaluation_sorts_strongest_first_with_undetermined_last() {
        let mut se_cutoffs = SeCutoffDictionary::new();
        se_cutoffs.insert(
            "se-reach".to_string(),
            uniform_tiers(CutoffScores { min: 950.0, avg: 960.0, max: 970.0 }),
        );
        let mut ib_cutoffs = IbCutoffDictionary::new();
        ib_cutoffs.insert(
            "ib-match".to_string(),
            CutoffScores { min: 700.0, avg: 800.0, max: 950.0 },
        );

        let programs = vec![
            ProgramRecord { scheme: Scheme::Se, program: sample_program("se-reach") },
            ProgramRecord { scheme: Scheme::Se, program: sample_program("se-missing") },
            ProgramRecord { scheme: Scheme::Ib, program: sample_program("ib-match") },
        ];
        let record = sample_record(full_student(), &[]);

        let results = evaluate_programs(&record, &programs, &se_cutoffs, &ib_cutoffs).unwrap();
        let chances: Vec<SuccessChance> = results.iter().map(|r| r.chance).collect();
        assert_eq!(
            chances,
            vec![
                SuccessChance::Likely,
                SuccessChance::None,
                SuccessChance::NotImplemented,
            ]
        );

        let again = evaluate_programs(&record, &programs, &se_cutoffs, &ib_cutoffs).unwrap();
        assert_eq!(results, again);
    }

    #[test]
    fn evaluation_grants_the_bonus_only_inside_the_boundary() {
        let mut ib_cutoffs = IbCutoffDictionary::new();
        ib_cutoffs.insert(
            "ib-x".to_string(),
            CutoffScores { min: 700.0, avg: 800.0, max: 950.0 },
        );
        let programs = vec![ProgramRecord {
            scheme: Scheme::Ib,
            program: sample_program("ib-x"),
        }];
        let se_cutoffs = SeCutoffDictionary::new();

        let inside = sample_record(full_student(), &["ib-x-school"]);
        let outside = sample_record(full_student(), &[]);
        let inside_results =
            evaluate_programs(&inside, &programs, &se_cutoffs, &ib_cutoffs).unwrap();
        let outside_results =
            evaluate_programs(&outside, &programs, &se_cutoffs, &ib_cutoffs).unwrap();
        assert_eq!(inside_results[0].points, Some(954.0));
        assert_eq!(outside_results[0].points, Some(904.0));
        assert_eq!(inside_results[0].chance, SuccessChance::Certain);
        assert_eq!(outside_results[0].chance, SuccessChance::Likely);
    }
}
