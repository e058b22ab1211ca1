// tests/tip_racks.rs
use pipette_transfer::{
    LabwareFormat, OutOfTips, TipRack, TipRackSet, TipSource, Well,
};

#[test]
fn test_well_names() {
    let well = Well::from_name(1, LabwareFormat::Standard96, "B3").unwrap();
    assert_eq!((well.row, well.column), (1, 2));
    assert_eq!(well.name(), "B3");

    let well = Well::from_name(1, LabwareFormat::Standard384, "p24").unwrap();
    assert_eq!((well.row, well.column), (15, 23));
    assert_eq!(well.name(), "P24");

    assert_eq!(Well::from_name(1, LabwareFormat::Standard96, "3B"), None);
    assert_eq!(Well::from_name(1, LabwareFormat::Standard96, "A0"), None);
    assert_eq!(Well::from_name(1, LabwareFormat::Standard96, ""), None);
}

#[test]
fn test_well_name_past_the_alphabet() {
    let well = Well::new(1, LabwareFormat::Irregular, 200, 0);
    let name = well.name();
    assert!(name.ends_with('1'));
    assert_eq!(name.chars().count(), 2);
}

#[test]
fn test_tips_are_taken_column_major() {
    let mut rack = TipRack::standard_96(3, 300.0);

    let first = rack.next_tip(1, None).unwrap();
    assert_eq!(first.name(), "A1");
    rack.use_tips(first, 1);

    let second = rack.next_tip(1, None).unwrap();
    assert_eq!(second.name(), "B1");
    assert_eq!(rack.remaining(), 95);
}

#[test]
fn test_multichannel_needs_a_full_column_run() {
    let mut rack = TipRack::standard_96(3, 300.0);
    rack.use_tips(rack.well(0, 0), 1);

    // Column 1 is missing A1, so eight tips only fit in column 2.
    let well = rack.next_tip(8, None).unwrap();
    assert_eq!(well.name(), "A2");
    rack.use_tips(well, 8);
    assert!(!rack.has_tip(7, 1));
    assert!(rack.has_tip(1, 0));

    assert_eq!(rack.next_tip(9, None), None);
    assert_eq!(rack.next_tip(0, None), None);
}

#[test]
fn test_returned_tips_can_be_reused() {
    let mut rack = TipRack::standard_96(3, 300.0);
    let well = rack.next_tip(8, None).unwrap();
    rack.use_tips(well, 8);
    assert_eq!(rack.next_tip(1, None).unwrap().name(), "A2");

    rack.return_tips(well, 8);
    assert_eq!(rack.next_tip(1, None).unwrap().name(), "A1");

    rack.use_tips(rack.well(0, 5), 8);
    rack.reset();
    assert_eq!(rack.remaining(), 96);
}

#[test]
fn test_tip_source_moves_to_the_next_rack() {
    let mut tips = TipRackSet::new(vec![TipRack::new(1, 1, 2, 20.0), TipRack::new(2, 1, 2, 300.0)]);
    assert_eq!(tips.tip_max_volume(), Some(20.0));

    let picked: Vec<(u16, String)> = (0..4)
        .map(|_| {
            let location = tips.next_tip(1).unwrap();
            (location.well.labware, location.well.name())
        })
        .collect();
    assert_eq!(
        picked,
        vec![
            (1, "A1".to_string()),
            (1, "A2".to_string()),
            (2, "A1".to_string()),
            (2, "A2".to_string()),
        ]
    );

    assert_eq!(tips.next_tip(1), Err(OutOfTips { channels: 1 }));
    assert_eq!(tips.tip_max_volume(), None);
}

#[test]
fn test_tip_max_volume_follows_the_rack_in_use() {
    let mut tips = TipRackSet::new(vec![TipRack::new(1, 1, 1, 20.0), TipRack::new(2, 1, 1, 300.0)]);
    tips.next_tip(1).unwrap();
    assert_eq!(tips.tip_max_volume(), Some(300.0));
}

#[test]
fn test_starting_tip_skips_earlier_racks() {
    let first = TipRack::standard_96(1, 300.0);
    let second = TipRack::standard_96(2, 300.0);
    let start = second.well(2, 0);
    let mut tips = TipRackSet::new(vec![first, second]).with_starting_tip(start);

    let location = tips.next_tip(1).unwrap();
    assert_eq!(location.well, start);
    assert_eq!(tips.racks()[0].remaining(), 96);

    // Eight channels no longer fit in the rest of column 1.
    let location = tips.next_tip(8).unwrap();
    assert_eq!((location.well.labware, location.well.name()), (2, "A2".to_string()));
}

#[test]
fn test_starting_tip_in_unknown_rack_is_out_of_tips() {
    let start = Well::new(9, LabwareFormat::Standard96, 0, 0);
    let mut tips =
        TipRackSet::new(vec![TipRack::standard_96(1, 300.0)]).with_starting_tip(start);

    assert_eq!(tips.next_tip(1), Err(OutOfTips { channels: 1 }));
}

#[test]
fn test_rack_set_return_and_reset() {
    let mut tips = TipRackSet::new(vec![TipRack::standard_96(1, 300.0)]);
    let location = tips.next_tip(8).unwrap();
    assert_eq!(tips.remaining(), 88);

    tips.return_tip(location, 8);
    assert_eq!(tips.remaining(), 96);

    tips.next_tip(1).unwrap();
    tips.racks_mut()[0].use_tips(Well::new(1, LabwareFormat::Standard96, 0, 3), 8);
    tips.reset();
    assert_eq!(tips.remaining(), 96);
}
