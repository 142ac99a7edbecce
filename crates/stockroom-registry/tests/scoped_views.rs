use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use stockroom_core::DatabaseConfig;
use stockroom_registry::models::{Area, Commodity, Location, AREA_COMMODITIES, LOCATION_AREAS};
use stockroom_registry::{
    BackendFactory, BackendRegistry, ListFilter, MemoryBackend, Ownership, Principal, RegistryError,
    RegistryResult, RegistrySet,
};
use uuid::Uuid;

async fn memory_set() -> RegistrySet {
    let config = DatabaseConfig::new("memory://").unwrap();
    BackendRegistry::with_defaults().open(&config).await.unwrap()
}

fn principal() -> Principal {
    Principal::new(Uuid::new_v4(), Some(Uuid::new_v4()))
}

#[tokio::test]
async fn test_user_writes_visible_to_service_but_not_other_users() {
    let set = memory_set().await;
    let (u1, u2) = (principal(), principal());

    let mine = set.locations().create_user_registry(Some(&u1)).unwrap();
    let garage = mine.create(Location::new("Garage")).await.unwrap();
    assert_eq!(garage.ownership.user_id, Some(u1.user_id));
    assert_eq!(garage.ownership.tenant_id, u1.tenant_id);

    let service = set.locations().create_service_registry();
    let all = service.list(&ListFilter::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Garage");

    let theirs = set.locations().create_user_registry(Some(&u2)).unwrap();
    assert!(theirs.list(&ListFilter::all()).await.unwrap().is_empty());
    let err = theirs.get(garage.id.unwrap()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_views_of_the_same_set_share_state() {
    let set = memory_set().await;
    let user = principal();

    let first = set.locations().create_user_registry(Some(&user)).unwrap();
    let second = set.locations().create_user_registry(Some(&user)).unwrap();
    let created = first.create(Location::new("Attic")).await.unwrap();

    let fetched = second.get(created.id.unwrap()).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(second.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_writes_through_either_view_are_visible_through_the_other() {
    let set = memory_set().await;
    let user = principal();
    let mine = set.locations().create_user_registry(Some(&user)).unwrap();
    let service = set.locations().create_service_registry();

    // Service writes on the user's behalf
    let mut owned = Location::new("Garage");
    owned.ownership = Ownership::new(user.tenant_id, Some(user.user_id));
    let garage = service.create(owned).await.unwrap();
    let garage_id = garage.id.unwrap();
    assert_eq!(mine.get(garage_id).await.unwrap(), garage);

    let mut renamed = garage.clone();
    renamed.name = "Workshop".to_string();
    service.update(renamed).await.unwrap();
    assert_eq!(mine.get(garage_id).await.unwrap().name, "Workshop");

    service.delete(garage_id).await.unwrap();
    assert!(mine.get(garage_id).await.unwrap_err().is_not_found());
    assert_eq!(mine.count().await.unwrap(), 0);

    // User writes, service observes
    let attic = mine.create(Location::new("Attic")).await.unwrap();
    let attic_id = attic.id.unwrap();
    assert_eq!(service.get(attic_id).await.unwrap(), attic);

    let mut updated = attic.clone();
    updated.address = Some("Top floor".to_string());
    mine.update(updated).await.unwrap();
    assert_eq!(service.get(attic_id).await.unwrap().address.as_deref(), Some("Top floor"));

    mine.delete(attic_id).await.unwrap();
    assert!(service.get(attic_id).await.unwrap_err().is_not_found());
    assert!(service.list(&ListFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tenant_view_sees_all_users_of_the_tenant() {
    let set = memory_set().await;
    let tenant = Uuid::new_v4();
    let alice = Principal::new(Uuid::new_v4(), Some(tenant));
    let bob = Principal::new(Uuid::new_v4(), Some(tenant));
    let outsider = principal();

    for (who, name) in [(&alice, "Kitchen"), (&bob, "Basement"), (&outsider, "Shed")] {
        let view = set.locations().create_user_registry(Some(who)).unwrap();
        view.create(Location::new(name)).await.unwrap();
    }

    let tenant_view = set.locations().create_tenant_registry(tenant).unwrap();
    let mut names: Vec<String> = tenant_view
        .list(&ListFilter::all())
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Basement", "Kitchen"]);
}

#[tokio::test]
async fn test_user_registry_requires_identity() {
    let set = memory_set().await;
    assert!(matches!(
        set.areas().create_user_registry(None),
        Err(RegistryError::Authorization(_))
    ));
    assert!(matches!(
        set.areas().create_tenant_registry(Uuid::nil()),
        Err(RegistryError::Authorization(_))
    ));
}

#[tokio::test]
async fn test_parent_delete_restricted_while_children_exist() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let areas = set.areas().create_service_registry();

    let garage = locations.create(Location::new("Garage")).await.unwrap();
    let garage_id = garage.id.unwrap();
    let shelf = areas.create(Area::new("Shelf", garage_id)).await.unwrap();

    let err = locations.delete(garage_id).await.unwrap_err();
    match err {
        RegistryError::CascadeViolation { relation, children, .. } => {
            assert_eq!(relation, LOCATION_AREAS.name);
            assert_eq!(children, 1);
        }
        other => panic!("expected cascade violation, got {other:?}"),
    }
    // Nothing was removed
    assert_eq!(locations.get(garage_id).await.unwrap().name, "Garage");
    assert_eq!(set.children_of(LOCATION_AREAS.name, garage_id).await.unwrap(), vec![shelf.id.unwrap()]);

    areas.delete(shelf.id.unwrap()).await.unwrap();
    assert!(set.children_of(LOCATION_AREAS.name, garage_id).await.unwrap().is_empty());
    locations.delete(garage_id).await.unwrap();
    assert_eq!(locations.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_child_create_requires_visible_parent() {
    let set = memory_set().await;
    let (owner, stranger) = (principal(), principal());

    let garage = set
        .locations()
        .create_user_registry(Some(&owner))
        .unwrap()
        .create(Location::new("Garage"))
        .await
        .unwrap();

    let stranger_areas = set.areas().create_user_registry(Some(&stranger)).unwrap();
    let err = stranger_areas
        .create(Area::new("Shelf", garage.id.unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { entity: "location", .. }));
    assert_eq!(set.areas().create_service_registry().count().await.unwrap(), 0);

    let missing = set
        .areas()
        .create_service_registry()
        .create(Area::new("Orphan", Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_update_moves_child_between_parents() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let areas = set.areas().create_service_registry();

    let garage = locations.create(Location::new("Garage")).await.unwrap().id.unwrap();
    let attic = locations.create(Location::new("Attic")).await.unwrap().id.unwrap();
    let mut shelf = areas.create(Area::new("Shelf", garage)).await.unwrap();

    shelf.location_id = attic;
    let shelf = areas.update(shelf).await.unwrap();
    assert!(set.children_of(LOCATION_AREAS.name, garage).await.unwrap().is_empty());
    assert_eq!(set.children_of(LOCATION_AREAS.name, attic).await.unwrap(), vec![shelf.id.unwrap()]);

    // A move to a missing parent leaves the record and its association alone
    let mut moved = shelf.clone();
    moved.location_id = Uuid::new_v4();
    assert!(areas.update(moved).await.unwrap_err().is_not_found());
    assert_eq!(areas.get(shelf.id.unwrap()).await.unwrap().location_id, attic);
    assert_eq!(set.children_of(LOCATION_AREAS.name, attic).await.unwrap().len(), 1);

    locations.delete(garage).await.unwrap();
    assert!(locations.delete(attic).await.unwrap_err().is_cascade_violation());
}

#[tokio::test]
async fn test_failed_move_keeps_child_order() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let areas = set.areas().create_service_registry();

    let garage = locations.create(Location::new("Garage")).await.unwrap().id.unwrap();
    let shelf = areas.create(Area::new("Shelf", garage)).await.unwrap();
    let bench = areas.create(Area::new("Bench", garage)).await.unwrap();

    let mut moved = shelf.clone();
    moved.location_id = Uuid::new_v4();
    assert!(areas.update(moved).await.unwrap_err().is_not_found());
    assert_eq!(
        set.children_of(LOCATION_AREAS.name, garage).await.unwrap(),
        vec![shelf.id.unwrap(), bench.id.unwrap()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_move_racing_parent_delete_never_orphans() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let areas = set.areas().create_service_registry();

    for _ in 0..500 {
        let garage = locations.create(Location::new("Garage")).await.unwrap().id.unwrap();
        let shelf = areas.create(Area::new("Shelf", garage)).await.unwrap();
        let shelf_id = shelf.id.unwrap();

        let mover = {
            let areas = areas.clone();
            let mut moved = shelf.clone();
            moved.location_id = Uuid::new_v4();
            tokio::spawn(async move { areas.update(moved).await })
        };
        let deleter = {
            let locations = locations.clone();
            tokio::spawn(async move { locations.delete(garage).await })
        };

        assert!(mover.await.unwrap().unwrap_err().is_not_found());
        assert!(deleter.await.unwrap().unwrap_err().is_cascade_violation());
        assert_eq!(areas.get(shelf_id).await.unwrap().location_id, garage);
        assert!(locations.get(garage).await.is_ok());
        assert_eq!(set.children_of(LOCATION_AREAS.name, garage).await.unwrap(), vec![shelf_id]);

        areas.delete(shelf_id).await.unwrap();
        locations.delete(garage).await.unwrap();
    }
}

#[tokio::test]
async fn test_update_and_delete_respect_scope() {
    let set = memory_set().await;
    let (owner, stranger) = (principal(), principal());

    let garage = set
        .locations()
        .create_user_registry(Some(&owner))
        .unwrap()
        .create(Location::new("Garage"))
        .await
        .unwrap();

    let theirs = set.locations().create_user_registry(Some(&stranger)).unwrap();
    let mut renamed = garage.clone();
    renamed.name = "Hijacked".to_string();
    assert!(theirs.update(renamed).await.unwrap_err().is_not_found());
    assert!(theirs.delete(garage.id.unwrap()).await.unwrap_err().is_not_found());

    let unsaved = Location::new("Nowhere");
    assert!(theirs.update(unsaved).await.unwrap_err().is_not_found());

    let service = set.locations().create_service_registry();
    assert_eq!(service.get(garage.id.unwrap()).await.unwrap().name, "Garage");
}

#[tokio::test]
async fn test_create_with_existing_id_fails() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let garage = locations.create(Location::new("Garage")).await.unwrap();

    let mut duplicate = Location::new("Garage again");
    duplicate.id = garage.id;
    assert!(matches!(
        locations.create(duplicate).await,
        Err(RegistryError::AlreadyExists { entity: "location", .. })
    ));
}

#[tokio::test]
async fn test_list_filters_by_parent_and_pages() {
    let set = memory_set().await;
    let locations = set.locations().create_service_registry();
    let areas = set.areas().create_service_registry();
    let commodities = set.commodities().create_service_registry();

    let garage = locations.create(Location::new("Garage")).await.unwrap().id.unwrap();
    let shelf = areas.create(Area::new("Shelf", garage)).await.unwrap().id.unwrap();
    let bench = areas.create(Area::new("Bench", garage)).await.unwrap().id.unwrap();

    for i in 0..5 {
        commodities.create(Commodity::new(format!("Screw box {i}"), shelf)).await.unwrap();
    }
    commodities.create(Commodity::new("Vice", bench)).await.unwrap();

    let on_shelf = commodities.list(&ListFilter::children_of("area_id", shelf)).await.unwrap();
    assert_eq!(on_shelf.len(), 5);
    assert!(on_shelf.iter().all(|c| c.area_id == shelf));

    let page = commodities
        .list(&ListFilter::children_of("area_id", shelf).offset(1).limit(2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, on_shelf[1].id);

    assert_eq!(set.children_of(AREA_COMMODITIES.name, bench).await.unwrap().len(), 1);
    assert_eq!(commodities.count().await.unwrap(), 6);
}

#[tokio::test]
async fn test_list_rejects_unknown_parent_column() {
    let set = memory_set().await;
    let areas = set.areas().create_service_registry();
    let err = areas
        .list(&ListFilter::children_of("warehouse_id", Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Storage { entity: "area", operation: "list", .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_through_many_views() {
    let set = memory_set().await;
    let garage = set
        .locations()
        .create_service_registry()
        .create(Location::new("Garage"))
        .await
        .unwrap()
        .id
        .unwrap();
    let shelf = set
        .areas()
        .create_service_registry()
        .create(Area::new("Shelf", garage))
        .await
        .unwrap()
        .id
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let view = set.commodities().create_service_registry();
        handles.push(tokio::spawn(async move {
            view.create(Commodity::new(format!("Item {i}"), shelf)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(set.commodities().create_service_registry().count().await.unwrap(), 32);
    assert_eq!(set.children_of(AREA_COMMODITIES.name, shelf).await.unwrap().len(), 32);
}

#[tokio::test]
async fn test_close_releases_backend() {
    let set = memory_set().await;
    set.ping().await.unwrap();
    assert_eq!(set.backend(), "memory");
    set.close().await.unwrap();
}

struct CountingBackend {
    opened: Arc<AtomicUsize>,
}

#[async_trait]
impl BackendFactory for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn open(&self, _config: &DatabaseConfig) -> RegistryResult<RegistrySet> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryBackend::new().build())
    }
}

#[tokio::test]
async fn test_unregistered_scheme_opens_nothing() {
    let opened = Arc::new(AtomicUsize::new(0));
    let mut registry = BackendRegistry::new();
    registry
        .register("counting", Arc::new(CountingBackend { opened: opened.clone() }))
        .unwrap();
    assert!(matches!(
        registry.register("counting", Arc::new(CountingBackend { opened: opened.clone() })),
        Err(RegistryError::DuplicateRegistration(_))
    ));

    let unknown = DatabaseConfig::new("mysql://localhost/app").unwrap();
    assert!(matches!(
        registry.open(&unknown).await,
        Err(RegistryError::UnknownBackend(s)) if s == "mysql"
    ));
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    let known = DatabaseConfig::new("counting://local").unwrap();
    let set = registry.open(&known).await.unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(set.backend(), "memory");
}
