//! Repository contract shared by all entity kinds

use packdb::prelude::*;
use std::fmt::Debug;

/// get / update / delete / clear behave the same for every repository.
async fn check_contract<R>(
    repo: &R,
    entity: R::Entity,
    id: R::Id,
    rename: impl Fn(&mut R::Entity),
)
where
    R: Repository,
    R::Entity: Clone + PartialEq + Debug,
{
    assert!(repo.get(id).await.unwrap().is_none());
    assert!(!repo.update(entity.clone()).await.unwrap());
    assert!(repo.get(id).await.unwrap().is_none());

    assert_eq!(repo.insert(vec![entity.clone()]).await.unwrap(), 1);
    assert!(repo.get(id).await.unwrap().is_some());

    let mut renamed = entity.clone();
    rename(&mut renamed);
    assert!(repo.update(renamed.clone()).await.unwrap());
    assert_ne!(repo.get(id).await.unwrap(), Some(entity));

    assert_eq!(repo.delete(vec![id]).await.unwrap().total(), 1);
    assert!(repo.get(id).await.unwrap().is_none());
    assert!(repo.delete(vec![id]).await.unwrap().is_empty());

    assert_eq!(repo.insert(vec![renamed]).await.unwrap(), 1);
    assert_eq!(repo.clear().await.unwrap(), 1);
    assert_eq!(repo.clear().await.unwrap(), 0);
}

#[tokio::test]
async fn test_grouping_contract() {
    let db = PackDb::in_memory();
    let g = Grouping::new("Loft");
    check_contract(&db.groupings, g.clone(), g.id, |g: &mut Grouping| g.name = "Attic".into()).await;
}

#[tokio::test]
async fn test_container_contract() {
    let db = PackDb::in_memory();
    let c = Container::new("Tote");
    check_contract(&db.containers, c.clone(), c.id, |c: &mut Container| c.name = "Tub".into()).await;
}

#[tokio::test]
async fn test_record_contract() {
    let db = PackDb::in_memory();
    let r = Record::new("Kettle").with_value(18.0);
    check_contract(&db.records, r.clone(), r.id, |r: &mut Record| r.numeric_value = 21.0).await;
}

#[tokio::test]
async fn test_fields_round_trip() {
    let db = PackDb::in_memory();
    let g = Grouping::new("Office").with_description("Second floor");
    let c = Container::new("Cabinet")
        .with_description("Grey, locked")
        .in_grouping(g.id);
    let r = Record::new("Laptop")
        .with_description("Work machine")
        .with_value(1249.99)
        .sensitive(true)
        .with_image("images/laptop.jpg")
        .in_container(c.id);
    db.groupings.insert(vec![g.clone()]).await.unwrap();
    db.containers.insert(vec![c.clone()]).await.unwrap();
    db.records.insert(vec![r.clone()]).await.unwrap();

    assert_eq!(db.records.get(r.id).await.unwrap(), Some(r.clone()));
    let stored = db.containers.get(c.id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("Grey, locked"));
    assert_eq!(stored.grouping_id, Some(g.id));
    assert_eq!(stored.last_modified, c.last_modified);
    let stored = db.groupings.get(g.id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("Second floor"));
}

#[tokio::test]
async fn test_list_by_parent() {
    let db = PackDb::in_memory();
    let g = Grouping::new("Garden");
    let shed = Container::new("Shed").in_grouping(g.id);
    let other = Container::new("Other");
    db.groupings.insert(vec![g.clone()]).await.unwrap();
    db.containers.insert(vec![shed.clone(), other.clone()]).await.unwrap();
    db.records
        .insert(vec![
            Record::new("Rake").in_container(shed.id),
            Record::new("Hose").in_container(shed.id),
            Record::new("Gloves").in_container(other.id),
        ])
        .await
        .unwrap();

    let in_garden = db.containers.list_in_grouping(g.id).await.unwrap();
    assert_eq!(in_garden.iter().map(|c| c.id).collect::<Vec<_>>(), vec![shed.id]);

    let names: Vec<String> = db
        .records
        .list_in_container(shed.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Rake", "Hose"]);
}

#[tokio::test]
async fn test_move_touches_last_modified() {
    let db = PackDb::in_memory();
    let bin = Container::new("Bin");
    let mut r = Record::new("Tape");
    r.last_modified = chrono::DateTime::from_timestamp_millis(0).unwrap();
    db.containers.insert(vec![bin.clone()]).await.unwrap();
    db.records.insert(vec![r.clone()]).await.unwrap();

    assert_eq!(db.records.move_to(vec![r.id, RecordId::new()], Some(bin.id)).await.unwrap(), 1);
    let moved = db.records.get(r.id).await.unwrap().unwrap();
    assert_eq!(moved.container_id, Some(bin.id));
    assert!(moved.last_modified > r.last_modified);
}

#[tokio::test]
async fn test_missing_parent_is_rejected() {
    let db = PackDb::in_memory();
    let lamp = Record::new("Lamp").in_container(ContainerId::new());
    let err = db.records.insert(vec![lamp.clone()]).await;
    assert!(matches!(err, Err(DbError::ConstraintViolation(_))));
    assert!(db.records.get(lamp.id).await.unwrap().is_none());

    let crate_ = Container::new("Crate").in_grouping(GroupingId::new());
    let err = db.containers.insert(vec![crate_]).await;
    assert!(matches!(err, Err(DbError::ConstraintViolation(_))));

    let desk = Container::new("Desk");
    let pen = Record::new("Pen").in_container(desk.id);
    db.containers.insert(vec![desk]).await.unwrap();
    db.records.insert(vec![pen.clone()]).await.unwrap();
    assert_eq!(db.records.get(pen.id).await.unwrap(), Some(pen.clone()));

    let mut strayed = pen.clone();
    strayed.container_id = Some(ContainerId::new());
    assert!(matches!(
        db.records.update(strayed).await,
        Err(DbError::ConstraintViolation(_))
    ));
    assert!(matches!(
        db.records.move_to(vec![pen.id], Some(ContainerId::new())).await,
        Err(DbError::ConstraintViolation(_))
    ));
    assert_eq!(db.records.get(pen.id).await.unwrap(), Some(pen));
}
