use std::collections::{HashMap, HashSet};

use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    CutoffScores, Grade, IbCutoffDictionary, Program, ProgramRecord, Scheme, SeCutoffDictionary,
    StudentData, StudentRecord, Tier, TieredCutoffs,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let programs = vec![
        (
            "se-payton",
            "se",
            "Selective Enrollment Program",
            "Walter Payton College Prep",
            "payton",
        ),
        (
            "se-jones",
            "se",
            "Selective Enrollment Program",
            "Jones College Prep",
            "jones",
        ),
        (
            "se-lindblom",
            "se",
            "Selective Enrollment Program",
            "Lindblom Math and Science Academy",
            "lindblom",
        ),
        (
            "ib-lincoln-park",
            "ib",
            "International Baccalaureate Diploma Programme",
            "Lincoln Park High School",
            "lincoln-park",
        ),
        (
            "ib-senn",
            "ib",
            "International Baccalaureate Diploma Programme",
            "Senn High School",
            "senn",
        ),
        (
            "ib-back-of-the-yards",
            "ib",
            "International Baccalaureate Diploma Programme",
            "Back of the Yards College Prep",
            "back-of-the-yards",
        ),
    ];

    for (id, scheme, program_name, school_name, school_id) in programs {
        sqlx::query(
            r#"
            INSERT INTO admissions_chance.programs (id, scheme, program_name, school_name, school_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET scheme = EXCLUDED.scheme,
                program_name = EXCLUDED.program_name,
                school_name = EXCLUDED.school_name,
                school_id = EXCLUDED.school_id
            "#,
        )
        .bind(id)
        .bind(scheme)
        .bind(program_name)
        .bind(school_name)
        .bind(school_id)
        .execute(pool)
        .await?;
    }

    let se_cutoffs: Vec<(&str, i16, f64, f64, f64)> = vec![
        ("se-payton", 1, 836.0, 879.5, 900.0),
        ("se-payton", 2, 851.0, 886.5, 900.0),
        ("se-payton", 3, 861.0, 889.5, 900.0),
        ("se-payton", 4, 867.0, 892.5, 900.0),
        ("se-jones", 1, 787.0, 847.0, 894.0),
        ("se-jones", 2, 811.0, 858.0, 896.0),
        ("se-jones", 3, 829.0, 868.0, 898.0),
        ("se-jones", 4, 844.0, 875.0, 900.0),
        ("se-lindblom", 1, 658.0, 727.0, 829.0),
        ("se-lindblom", 2, 667.0, 735.0, 838.0),
        ("se-lindblom", 3, 684.0, 748.0, 846.0),
        ("se-lindblom", 4, 702.0, 761.0, 852.0),
    ];

    for (program_id, tier, min_score, avg_score, max_score) in se_cutoffs {
        sqlx::query(
            r#"
            INSERT INTO admissions_chance.se_cutoffs (program_id, tier, min_score, avg_score, max_score)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (program_id, tier) DO UPDATE
            SET min_score = EXCLUDED.min_score,
                avg_score = EXCLUDED.avg_score,
                max_score = EXCLUDED.max_score
            "#,
        )
        .bind(program_id)
        .bind(tier)
        .bind(min_score)
        .bind(avg_score)
        .bind(max_score)
        .execute(pool)
        .await?;
    }

    let ib_cutoffs: Vec<(&str, f64, f64, f64)> = vec![
        ("ib-lincoln-park", 762.0, 805.5, 861.0),
        ("ib-senn", 684.0, 741.0, 803.0),
        ("ib-back-of-the-yards", 512.0, 648.5, 755.0),
    ];

    for (program_id, min_score, avg_score, max_score) in ib_cutoffs {
        sqlx::query(
            r#"
            INSERT INTO admissions_chance.ib_cutoffs (program_id, min_score, avg_score, max_score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (program_id) DO UPDATE
            SET min_score = EXCLUDED.min_score,
                avg_score = EXCLUDED.avg_score,
                max_score = EXCLUDED.max_score
            "#,
        )
        .bind(program_id)
        .bind(min_score)
        .bind(avg_score)
        .bind(max_score)
        .execute(pool)
        .await?;
    }

    type SeedStudent = (
        Uuid,
        &'static str,
        &'static str,
        Option<f64>,
        Option<f64>,
        Option<&'static str>,
        Option<&'static str>,
        Option<&'static str>,
        Option<&'static str>,
        Option<i16>,
        Vec<&'static str>,
    );

    let students: Vec<SeedStudent> = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@example.com",
            Some(98.0),
            Some(95.0),
            Some("A"),
            Some("A"),
            Some("B"),
            Some("A"),
            Some(2),
            vec!["senn"],
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@example.com",
            Some(91.0),
            Some(88.0),
            None,
            None,
            None,
            None,
            Some(1),
            vec!["lincoln-park"],
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@example.com",
            Some(84.0),
            Some(90.0),
            Some("A"),
            Some("B"),
            Some("A"),
            Some("B"),
            None,
            vec![],
        ),
    ];

    for (id, name, email, pct_math, pct_read, g_math, g_read, g_sci, g_soc, tier, bounds) in
        students
    {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO admissions_chance.students
            (id, full_name, email, hsat_percentile_math, hsat_percentile_read,
             grade_math, grade_read, grade_sci, grade_soc_studies, tier, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, CURRENT_DATE)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                hsat_percentile_math = EXCLUDED.hsat_percentile_math,
                hsat_percentile_read = EXCLUDED.hsat_percentile_read,
                grade_math = EXCLUDED.grade_math,
                grade_read = EXCLUDED.grade_read,
                grade_sci = EXCLUDED.grade_sci,
                grade_soc_studies = EXCLUDED.grade_soc_studies,
                tier = EXCLUDED.tier,
                updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(pct_math)
        .bind(pct_read)
        .bind(g_math)
        .bind(g_read)
        .bind(g_sci)
        .bind(g_soc)
        .bind(tier)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query("DELETE FROM admissions_chance.attendance_bounds WHERE student_id = $1")
            .bind(student_id)
            .execute(pool)
            .await?;

        for school_id in bounds {
            sqlx::query(
                r#"
                INSERT INTO admissions_chance.attendance_bounds (student_id, school_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(student_id)
            .bind(school_id)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

fn parse_grade(value: Option<String>) -> anyhow::Result<Option<Grade>> {
    value.map(|s| s.parse()).transpose()
}

pub async fn fetch_student(pool: &PgPool, email: &str) -> anyhow::Result<StudentRecord> {
    let row = sqlx::query(
        "SELECT id, full_name, email, hsat_percentile_math, hsat_percentile_read, \
         grade_math, grade_read, grade_sci, grade_soc_studies, tier, updated_at \
         FROM admissions_chance.students WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student found with email {email}"))?;

    let id: Uuid = row.get("id");
    let data = StudentData {
        hsat_percentile_math: row.get("hsat_percentile_math"),
        hsat_percentile_read: row.get("hsat_percentile_read"),
        grade_math: parse_grade(row.get("grade_math"))?,
        grade_read: parse_grade(row.get("grade_read"))?,
        grade_sci: parse_grade(row.get("grade_sci"))?,
        grade_soc_studies: parse_grade(row.get("grade_soc_studies"))?,
        tier: row.get::<Option<i16>, _>("tier").and_then(Tier::from_number),
    };

    let bound_rows = sqlx::query(
        "SELECT school_id FROM admissions_chance.attendance_bounds WHERE student_id = $1",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    let boundary_schools: HashSet<String> = bound_rows
        .into_iter()
        .map(|row| row.get("school_id"))
        .collect();

    Ok(StudentRecord {
        full_name: row.get("full_name"),
        email: row.get("email"),
        updated_at: row.get("updated_at"),
        data,
        boundary_schools,
    })
}

pub async fn fetch_programs(
    pool: &PgPool,
    scheme: Option<Scheme>,
) -> anyhow::Result<Vec<ProgramRecord>> {
    let mut query = String::from(
        "SELECT id, scheme, program_name, school_name, school_id FROM admissions_chance.programs",
    );
    if scheme.is_some() {
        query.push_str(" WHERE scheme = $1");
    }
    query.push_str(" ORDER BY school_name, program_name");

    let mut rows = sqlx::query(&query);
    if let Some(scheme) = scheme {
        rows = rows.bind(scheme.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    let mut programs = Vec::new();

    for row in records {
        let scheme: String = row.get("scheme");
        programs.push(ProgramRecord {
            scheme: scheme.parse()?,
            program: Program {
                id: row.get("id"),
                program_name: row.get("program_name"),
                school_name: row.get("school_name"),
                school_id: row.get("school_id"),
            },
        });
    }

    Ok(programs)
}

pub async fn fetch_se_cutoffs(pool: &PgPool) -> anyhow::Result<SeCutoffDictionary> {
    let rows = sqlx::query(
        "SELECT program_id, tier, min_score, avg_score, max_score \
         FROM admissions_chance.se_cutoffs",
    )
    .fetch_all(pool)
    .await?;

    let mut partial: HashMap<String, [Option<CutoffScores>; 4]> = HashMap::new();
    for row in rows {
        let program_id: String = row.get("program_id");
        let tier: i16 = row.get("tier");
        let slot = match tier {
            1..=4 => (tier - 1) as usize,
            _ => {
                eprintln!("ignoring SE cutoff row for {program_id}: tier {tier} out of range");
                continue;
            }
        };
        partial.entry(program_id).or_default()[slot] = Some(CutoffScores {
            min: row.get("min_score"),
            avg: row.get("avg_score"),
            max: row.get("max_score"),
        });
    }

    let mut dictionary = SeCutoffDictionary::new();
    for (program_id, tiers) in partial {
        match tiers {
            [Some(tier1), Some(tier2), Some(tier3), Some(tier4)] => {
                dictionary.insert(program_id, TieredCutoffs { tier1, tier2, tier3, tier4 });
            }
            _ => eprintln!("skipping SE cutoffs for {program_id}: fewer than four tier rows"),
        }
    }

    Ok(dictionary)
}

pub async fn fetch_ib_cutoffs(pool: &PgPool) -> anyhow::Result<IbCutoffDictionary> {
    let rows = sqlx::query(
        "SELECT program_id, min_score, avg_score, max_score \
         FROM admissions_chance.ib_cutoffs",
    )
    .fetch_all(pool)
    .await?;

    let mut dictionary = IbCutoffDictionary::new();
    for row in rows {
        dictionary.insert(
            row.get("program_id"),
            CutoffScores {
                min: row.get("min_score"),
                avg: row.get("avg_score"),
                max: row.get("max_score"),
            },
        );
    }

    Ok(dictionary)
}

pub async fn import_cutoffs_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    scheme: Scheme,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        program_id: String,
        program_name: String,
        school_name: String,
        school_id: String,
        tier: Option<i16>,
        min_score: f64,
        avg_score: f64,
        max_score: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        sqlx::query(
            r#"
            INSERT INTO admissions_chance.programs (id, scheme, program_name, school_name, school_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET scheme = EXCLUDED.scheme,
                program_name = EXCLUDED.program_name,
                school_name = EXCLUDED.school_name,
                school_id = EXCLUDED.school_id
            "#,
        )
        .bind(&row.program_id)
        .bind(scheme.as_str())
        .bind(&row.program_name)
        .bind(&row.school_name)
        .bind(&row.school_id)
        .execute(pool)
        .await?;

        let result = match scheme {
            Scheme::Se => {
                let raw_tier = row.tier.with_context(|| {
                    format!("SE cutoff row for {} is missing a tier", row.program_id)
                })?;
                let tier = Tier::from_number(raw_tier).with_context(|| {
                    format!(
                        "SE cutoff row for {} has tier {raw_tier}, expected 1-4",
                        row.program_id
                    )
                })?;
                sqlx::query(
                    r#"
                    INSERT INTO admissions_chance.se_cutoffs
                    (program_id, tier, min_score, avg_score, max_score)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (program_id, tier) DO UPDATE
                    SET min_score = EXCLUDED.min_score,
                        avg_score = EXCLUDED.avg_score,
                        max_score = EXCLUDED.max_score
                    "#,
                )
                .bind(&row.program_id)
                .bind(tier.number())
                .bind(row.min_score)
                .bind(row.avg_score)
                .bind(row.max_score)
                .execute(pool)
                .await?
            }
            Scheme::Ib => {
                sqlx::query(
                    r#"
                    INSERT INTO admissions_chance.ib_cutoffs
                    (program_id, min_score, avg_score, max_score)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (program_id) DO UPDATE
                    SET min_score = EXCLUDED.min_score,
                        avg_score = EXCLUDED.avg_score,
                        max_score = EXCLUDED.max_score
                    "#,
                )
                .bind(&row.program_id)
                .bind(row.min_score)
                .bind(row.avg_score)
                .bind(row.max_score)
                .execute(pool)
                .await?
            }
        };

        if result.rows_affected() > 0 {
            imported += 1;
        }
    }

    Ok(imported)
}

pub async fn import_students_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        hsat_percentile_math: Option<f64>,
        hsat_percentile_read: Option<f64>,
        grade_math: Option<String>,
        grade_read: Option<String>,
        grade_sci: Option<String>,
        grade_soc_studies: Option<String>,
        tier: Option<i16>,
        boundary_schools: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        let grade_math = parse_grade(row.grade_math)
            .with_context(|| format!("bad math grade for {}", row.email))?;
        let grade_read = parse_grade(row.grade_read)
            .with_context(|| format!("bad reading grade for {}", row.email))?;
        let grade_sci = parse_grade(row.grade_sci)
            .with_context(|| format!("bad science grade for {}", row.email))?;
        let grade_soc_studies = parse_grade(row.grade_soc_studies)
            .with_context(|| format!("bad social studies grade for {}", row.email))?;
        let tier = match row.tier {
            Some(raw) => Some(Tier::from_number(raw).with_context(|| {
                format!("student {} has tier {raw}, expected 1-4", row.email)
            })?),
            None => None,
        };

        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO admissions_chance.students
            (id, full_name, email, hsat_percentile_math, hsat_percentile_read,
             grade_math, grade_read, grade_sci, grade_soc_studies, tier, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, CURRENT_DATE)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                hsat_percentile_math = EXCLUDED.hsat_percentile_math,
                hsat_percentile_read = EXCLUDED.hsat_percentile_read,
                grade_math = EXCLUDED.grade_math,
                grade_read = EXCLUDED.grade_read,
                grade_sci = EXCLUDED.grade_sci,
                grade_soc_studies = EXCLUDED.grade_soc_studies,
                tier = EXCLUDED.tier,
                updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(row.hsat_percentile_math)
        .bind(row.hsat_percentile_read)
        .bind(grade_math.map(|g| g.to_string()))
        .bind(grade_read.map(|g| g.to_string()))
        .bind(grade_sci.map(|g| g.to_string()))
        .bind(grade_soc_studies.map(|g| g.to_string()))
        .bind(tier.map(Tier::number))
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query("DELETE FROM admissions_chance.attendance_bounds WHERE student_id = $1")
            .bind(student_id)
            .execute(pool)
            .await?;

        if let Some(schools) = &row.boundary_schools {
            for school_id in schools.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(
                    r#"
                    INSERT INTO admissions_chance.attendance_bounds (student_id, school_id)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(student_id)
                .bind(school_id)
                .execute(pool)
                .await?;
            }
        }

        imported += 1;
    }

    Ok(imported)
}
