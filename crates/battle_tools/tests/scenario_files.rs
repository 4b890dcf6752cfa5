//! Validation and queries against scenario files on disk.

use std::fs;
use std::path::PathBuf;

use battle_core::grid_config::Team;
use battle_core::hex::HexGridPosition;
use battle_test_utils::fixtures::BattlefieldBuilder;
use battle_tools::query::{self, OpenPositionQuery};
use battle_tools::validate::validate_data_directory;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("battle_tools_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn scenario_text(builder: &BattlefieldBuilder) -> String {
    ron::ser::to_string_pretty(builder.scenario(), ron::ser::PrettyConfig::default()).unwrap()
}

#[test]
fn test_directory_reports_every_scenario_in_order() {
    let dir = scratch_dir("validate");
    let good = BattlefieldBuilder::new(11, 11)
        .unit(Team::Blue, 0, 3)
        .unit(Team::Red, 0, -3);
    let crowded = BattlefieldBuilder::new(11, 11)
        .unit(Team::Blue, 0, 3)
        .unit(Team::Blue, 1, 3)
        .unit(Team::Red, 9, 0);
    fs::write(dir.join("a_good.ron"), scenario_text(&good)).unwrap();
    fs::write(dir.join("b_crowded.ron"), scenario_text(&crowded)).unwrap();
    fs::write(dir.join("notes.txt"), "not a scenario").unwrap();

    let summary = validate_data_directory(&dir).unwrap();

    assert_eq!(summary.files.len(), 2);
    assert!(summary.files[0].path.ends_with("a_good.ron"));
    assert!(summary.files[0].is_valid());
    assert_eq!(summary.files[1].entities, 3);
    // One overlap and one unit off the board.
    assert_eq!(summary.files[1].issues.len(), 2);
    assert_eq!(summary.issue_count(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_written_scenario_answers_queries() {
    let dir = scratch_dir("query");
    let path = dir.join("board.ron");
    let builder = BattlefieldBuilder::new(15, 15)
        .seed(4)
        .unit(Team::Blue, 0, 0)
        .unit(Team::Red, 0, -4);
    fs::write(&path, scenario_text(&builder)).unwrap();

    let scenario = query::load_scenario(&path).unwrap();
    assert_eq!(&scenario, builder.scenario());

    let found = query::open_position(
        &scenario,
        &OpenPositionQuery {
            target: HexGridPosition::ZERO,
            radius: 1,
            behind_from: Some(HexGridPosition::new(0, -4)),
            ignore: None,
        },
    )
    .unwrap()
    .unwrap();
    assert_eq!(found.distance(HexGridPosition::ZERO), 2);
    assert!(found.r > 0, "{found} is not behind the blue unit");

    let report = query::simulate(&scenario, 3).unwrap();
    assert_eq!(report.ticks, 3);

    let _ = fs::remove_dir_all(&dir);
}
