//! Runs only when `SQLXGEN_TEST_DATABASE_URL` points at a Postgres database.

use sqlx::{Connection, PgConnection};
use sqlxgen_core::store::{
    self, Binding, BulkOptions, Entity, Field, OrderBy, Page, Queryable, StoreError,
};

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
struct Movie {
    id: Field<i32>,
    rating: Field<i32>,
    tags: Field<Vec<String>>,
    title: Field<String>,
}

impl Entity for Movie {
    type Database = sqlx::Postgres;

    const TABLE_NAME: &'static str = r#""store_movies""#;
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const GENERATED_COLUMNS: &'static [&'static str] = &["id"];

    const INSERT_QUERY: &'static str = r#"INSERT INTO "store_movies" (
  "rating",
  "tags",
  "title"
)
VALUES (
  :rating,
  :tags,
  :title
)
RETURNING
  "id",
  "rating",
  "tags",
  "title";"#;
    const COUNT_QUERY: &'static str = r#"SELECT count(*) AS count
FROM "store_movies"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:rating AS INT4) IS NULL OR "rating" = CAST(:rating AS INT4))
  AND (CAST(:tags AS TEXT[]) IS NULL OR "tags" = CAST(:tags AS TEXT[]))
  AND (CAST(:title AS TEXT) IS NULL OR "title" = CAST(:title AS TEXT));"#;
    const FIND_ALL_QUERY: &'static str = r#"SELECT
  "id",
  "rating",
  "tags",
  "title"
FROM "store_movies"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:rating AS INT4) IS NULL OR "rating" = CAST(:rating AS INT4))
  AND (CAST(:tags AS TEXT[]) IS NULL OR "tags" = CAST(:tags AS TEXT[]))
  AND (CAST(:title AS TEXT) IS NULL OR "title" = CAST(:title AS TEXT));"#;
    const FIND_BY_PK_QUERY: &'static str = r#"SELECT
  "id",
  "rating",
  "tags",
  "title"
FROM "store_movies"
WHERE "id" = :id
LIMIT 1;"#;
    const DELETE_BY_PK_QUERY: &'static str = r#"DELETE FROM "store_movies"
WHERE "id" = :id;"#;
    const DELETE_ALL_QUERY: &'static str = r#"DELETE FROM "store_movies"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:rating AS INT4) IS NULL OR "rating" = CAST(:rating AS INT4))
  AND (CAST(:tags AS TEXT[]) IS NULL OR "tags" = CAST(:tags AS TEXT[]))
  AND (CAST(:title AS TEXT) IS NULL OR "title" = CAST(:title AS TEXT));"#;

    const RETURNING: &'static str = r#"
RETURNING
  "id",
  "rating",
  "tags",
  "title""#;
    const PK_WHERE: &'static str = r#"
WHERE "id" = :id"#;
    const ALL_FIELDS_WHERE: &'static str = r#"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:rating AS INT4) IS NULL OR "rating" = CAST(:rating AS INT4))
  AND (CAST(:tags AS TEXT[]) IS NULL OR "tags" = CAST(:tags AS TEXT[]))
  AND (CAST(:title AS TEXT) IS NULL OR "title" = CAST(:title AS TEXT))"#;

    fn bindings(&self) -> Vec<Binding> {
        vec![
            self.id.bind("id"),
            self.rating.bind("rating"),
            self.tags.bind("tags"),
            self.title.bind("title"),
        ]
    }
}

/// A column of a user-defined enum type, read back as text.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
struct Feeling {
    id: Field<i32>,
    feeling: Field<String>,
    name: Field<String>,
}

impl Entity for Feeling {
    type Database = sqlx::Postgres;

    const TABLE_NAME: &'static str = r#""store_feelings""#;
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const GENERATED_COLUMNS: &'static [&'static str] = &["id"];
    const BIND_CASTS: &'static [(&'static str, &'static str)] =
        &[("feeling", r#""pg_temp"."store_feeling""#)];

    const INSERT_QUERY: &'static str = r#"INSERT INTO "store_feelings" (
  "feeling",
  "name"
)
VALUES (
  CAST(:feeling AS "pg_temp"."store_feeling"),
  :name
)
RETURNING
  "id",
  CAST("feeling" AS TEXT) AS "feeling",
  "name";"#;
    const COUNT_QUERY: &'static str = r#"SELECT count(*) AS count
FROM "store_feelings"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:feeling AS "pg_temp"."store_feeling") IS NULL OR "feeling" = CAST(:feeling AS "pg_temp"."store_feeling"))
  AND (CAST(:name AS TEXT) IS NULL OR "name" = CAST(:name AS TEXT));"#;
    const FIND_ALL_QUERY: &'static str = r#"SELECT
  "id",
  CAST("feeling" AS TEXT) AS "feeling",
  "name"
FROM "store_feelings"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:feeling AS "pg_temp"."store_feeling") IS NULL OR "feeling" = CAST(:feeling AS "pg_temp"."store_feeling"))
  AND (CAST(:name AS TEXT) IS NULL OR "name" = CAST(:name AS TEXT));"#;
    const FIND_BY_PK_QUERY: &'static str = r#"SELECT
  "id",
  CAST("feeling" AS TEXT) AS "feeling",
  "name"
FROM "store_feelings"
WHERE "id" = :id
LIMIT 1;"#;
    const DELETE_BY_PK_QUERY: &'static str = r#"DELETE FROM "store_feelings"
WHERE "id" = :id;"#;
    const DELETE_ALL_QUERY: &'static str = r#"DELETE FROM "store_feelings"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:feeling AS "pg_temp"."store_feeling") IS NULL OR "feeling" = CAST(:feeling AS "pg_temp"."store_feeling"))
  AND (CAST(:name AS TEXT) IS NULL OR "name" = CAST(:name AS TEXT));"#;

    const RETURNING: &'static str = r#"
RETURNING
  "id",
  CAST("feeling" AS TEXT) AS "feeling",
  "name""#;
    const PK_WHERE: &'static str = r#"
WHERE "id" = :id"#;
    const ALL_FIELDS_WHERE: &'static str = r#"
WHERE TRUE
  AND (CAST(:id AS INT4) IS NULL OR "id" = CAST(:id AS INT4))
  AND (CAST(:feeling AS "pg_temp"."store_feeling") IS NULL OR "feeling" = CAST(:feeling AS "pg_temp"."store_feeling"))
  AND (CAST(:name AS TEXT) IS NULL OR "name" = CAST(:name AS TEXT))"#;

    fn bindings(&self) -> Vec<Binding> {
        vec![
            self.id.bind("id"),
            self.feeling.bind("feeling"),
            self.name.bind("name"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
struct TitleRow {
    id: Option<i32>,
    title: Option<String>,
}

const TITLES_SQL: &str = r#"-- :rating type: int4
select id, title
from store_movies
where (CAST(:rating AS INT4) IS NULL OR rating = :rating)
order by id;"#;

#[derive(Debug, Clone, Default)]
struct TitlesArgs {
    rating: Option<i32>,
}

impl Queryable for TitlesArgs {
    type Database = sqlx::Postgres;
    type Row = TitleRow;

    const SQL: &'static str = TITLES_SQL;

    fn bindings(&self) -> Vec<Binding> {
        vec![Field::from_option(self.rating).bind("rating")]
    }
}

/// Same text declared single-row without a `LIMIT 1` to back it.
#[derive(Debug, Clone, Default)]
struct OneTitleArgs {
    rating: Option<i32>,
}

impl Queryable for OneTitleArgs {
    type Database = sqlx::Postgres;
    type Row = TitleRow;

    const SQL: &'static str = TITLES_SQL;
    const RETURNS_ONE: bool = true;

    fn bindings(&self) -> Vec<Binding> {
        vec![Field::from_option(self.rating).bind("rating")]
    }
}

fn movie(title: &str, rating: i32) -> Movie {
    Movie {
        title: title.to_string().into(),
        rating: rating.into(),
        tags: Field::Value(vec!["drama".to_string()]),
        ..Movie::default()
    }
}

async fn connect() -> Option<PgConnection> {
    let url = std::env::var("SQLXGEN_TEST_DATABASE_URL").ok()?;
    let mut conn = PgConnection::connect(&url).await.unwrap();
    sqlx::query(
        "create temp table if not exists store_movies (
            id serial primary key,
            rating int4,
            tags text[],
            title text not null
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    Some(conn)
}

/// Counts insert statements against `store_movies` in `store_batches`.
async fn count_insert_statements(conn: &mut PgConnection) {
    for sql in [
        "create temp table store_batches (n int4 not null)",
        "create function pg_temp.store_count_batch() returns trigger language plpgsql as $$
        begin
            insert into store_batches values (1);
            return null;
        end
        $$",
        "create trigger store_count_batch after insert on store_movies
        for each statement execute function pg_temp.store_count_batch()",
    ] {
        sqlx::query(sql).execute(&mut *conn).await.unwrap();
    }
}

async fn rows(conn: &mut PgConnection, table: &str) -> i64 {
    sqlx::query_scalar(&format!("select count(*) from {table}"))
        .fetch_one(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn single_row_lifecycle() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();

    let heat = store::insert_one(&mut *tx, &movie("Heat", 8)).await.unwrap();
    let Field::Value(id) = heat.id else {
        panic!("generated key was not returned: {heat:?}");
    };
    store::insert_one(&mut *tx, &movie("Ronin", 7)).await.unwrap();

    assert_eq!(store::count(&mut *tx, &Movie::default()).await.unwrap(), 2);
    let by_title = Movie {
        title: "Ronin".to_string().into(),
        ..Movie::default()
    };
    assert_eq!(store::count(&mut *tx, &by_title).await.unwrap(), 1);

    let key = Movie {
        id: id.into(),
        ..Movie::default()
    };
    assert_eq!(store::find_by_pk(&mut *tx, &key).await.unwrap(), heat);

    let err = store::find_one(&mut *tx, &Movie::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::FoundMultiple { .. }), "{err}");
    let found = store::find_one(&mut *tx, &by_title).await.unwrap();
    assert_eq!(found.rating, Field::Value(7));
    let missing = Movie {
        title: "Thief".to_string().into(),
        ..Movie::default()
    };
    let err = store::find_one(&mut *tx, &missing).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");

    // absent fields are left untouched, null fields are cleared
    let patch = Movie {
        id: id.into(),
        rating: 9.into(),
        tags: Field::Null,
        ..Movie::default()
    };
    let updated = store::update_by_pk(&mut *tx, &patch).await.unwrap();
    assert_eq!(updated.title, Field::Value("Heat".to_string()));
    assert_eq!(updated.rating, Field::Value(9));
    assert_eq!(updated.tags, Field::Null);

    let err = store::update_by_ak(&mut *tx, &Movie::default(), &["title"])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NothingToUpdate { .. }), "{err}");

    store::delete_by_pk(&mut *tx, &key).await.unwrap();
    let err = store::delete_by_pk(&mut *tx, &key).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn alternate_key_updates_need_a_unique_match() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();
    let movies = [movie("Heat", 8), movie("Ronin", 7), movie("Ronin", 6)];
    store::insert(&mut *tx, &movies).await.unwrap();

    let rerate = |title: &str| Movie {
        title: title.to_string().into(),
        rating: 10.into(),
        ..Movie::default()
    };

    let err = store::update_by_ak(&mut *tx, &rerate("Thief"), &["title"])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::WouldMatch { count: 0, .. }), "{err}");

    let err = store::update_by_ak(&mut *tx, &rerate("Ronin"), &["title"])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::WouldMatch { count: 2, .. }), "{err}");

    let err = store::update_by_ak(&mut *tx, &rerate("Heat"), &["name"])
        .await
        .unwrap_err();
    assert!(
        matches!(&err, StoreError::UnknownColumn { column, .. } if column == "name"),
        "{err}"
    );

    let err = store::update_by_ak(&mut *tx, &rerate("Heat"), &[]).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingKeyColumns { .. }), "{err}");

    let updated = store::update_by_ak(&mut *tx, &rerate("Heat"), &["title"])
        .await
        .unwrap();
    assert_eq!(updated.rating, Field::Value(10));
    assert_eq!(updated.tags, Field::Value(vec!["drama".to_string()]));

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn batches_and_pages() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();
    count_insert_statements(&mut tx).await;

    let movies: Vec<_> = (1..=7).map(|n| movie(&format!("Movie {n}"), n)).collect();
    // four fields per row, so batches of floor(9 / 4) = 2 rows
    let options = BulkOptions { max_parameters: 9 };
    let inserted = store::bulk_insert_with(&mut *tx, &movies, options).await.unwrap();
    assert_eq!(inserted.len(), 7);
    assert_eq!(inserted[6].title, Field::Value("Movie 7".to_string()));
    // ceil(7 / 2)
    assert_eq!(rows(&mut tx, "store_batches").await, 4);

    let page = store::find_page(
        &mut *tx,
        &Movie::default(),
        Page::new(2, 3),
        &[OrderBy::desc("rating")],
    )
    .await
    .unwrap();
    let ratings: Vec<_> = page.iter().map(|movie| movie.rating.clone()).collect();
    assert_eq!(ratings, vec![Field::Value(4), Field::Value(3), Field::Value(2)]);

    let err = store::find_page(&mut *tx, &Movie::default(), Page::new(0, 3), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPage { .. }), "{err}");

    let err = store::bulk_insert_with(&mut *tx, &movies, BulkOptions { max_parameters: 3 })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BindCeiling { .. }), "{err}");

    let seven = Movie {
        rating: 7.into(),
        ..Movie::default()
    };
    store::delete_one(&mut *tx, &seven).await.unwrap();
    let err = store::delete_one(&mut *tx, &Movie::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::WouldMatch { count: 6, .. }), "{err}");
    assert_eq!(store::delete_all(&mut *tx, &Movie::default()).await.unwrap(), 6);

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn failing_batch_rolls_back_earlier_batches() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();
    count_insert_statements(&mut tx).await;

    let mut movies: Vec<_> = (1..=5).map(|n| movie(&format!("Movie {n}"), n)).collect();
    // title is not null, so the third batch fails
    movies[4].title = Field::Null;
    let err = store::bulk_insert_with(&mut *tx, &movies, BulkOptions { max_parameters: 8 })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Storage { .. }), "{err}");

    assert_eq!(rows(&mut tx, "store_movies").await, 0);
    assert_eq!(rows(&mut tx, "store_batches").await, 0);
    // the outer transaction stays usable
    store::insert_one(&mut *tx, &movie("Heat", 8)).await.unwrap();
    assert_eq!(rows(&mut tx, "store_movies").await, 1);

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn hand_written_queries() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();
    let movies = [movie("Heat", 8), movie("Ronin", 7), movie("Ronin 2", 7)];
    store::insert(&mut *tx, &movies).await.unwrap();

    let all = TitlesArgs::default();
    let sevens = TitlesArgs { rating: Some(7) };
    let eights = TitlesArgs { rating: Some(8) };
    let none = TitlesArgs { rating: Some(1) };

    assert_eq!(store::query(&mut *tx, &all).await.unwrap().len(), 3);
    assert_eq!(store::count_sql(&mut *tx, &all).await.unwrap(), 3);
    assert_eq!(store::count_sql(&mut *tx, &sevens).await.unwrap(), 2);
    assert_eq!(store::count_sql(&mut *tx, &none).await.unwrap(), 0);

    let first = store::query_first(&mut *tx, &sevens).await.unwrap();
    assert_eq!(first.title.as_deref(), Some("Ronin"));
    let err = store::query_first(&mut *tx, &none).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");

    let heat = store::query_one(&mut *tx, &eights).await.unwrap();
    assert_eq!(heat.title.as_deref(), Some("Heat"));
    let err = store::query_one(&mut *tx, &sevens).await.unwrap_err();
    assert!(matches!(err, StoreError::FoundMultiple { .. }), "{err}");
    let err = store::query_one(&mut *tx, &none).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");
    assert_eq!(store::query_optional(&mut *tx, &none).await.unwrap(), None);

    // a single-row declaration is enforced on every call
    let err = store::query(&mut *tx, &OneTitleArgs { rating: Some(7) })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::FoundMultiple { .. }), "{err}");
    let one = store::query(&mut *tx, &OneTitleArgs { rating: Some(8) })
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn enum_columns_bind_through_casts() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let mut tx = conn.begin().await.unwrap();
    for sql in [
        "create type pg_temp.store_feeling as enum ('calm', 'tense', 'glad')",
        "create temp table store_feelings (
            id serial primary key,
            feeling pg_temp.store_feeling not null,
            name text not null
        )",
    ] {
        sqlx::query(sql).execute(&mut *tx).await.unwrap();
    }

    let row = |feeling: &str, name: &str| Feeling {
        feeling: feeling.to_string().into(),
        name: name.to_string().into(),
        ..Feeling::default()
    };
    let ana = store::insert_one(&mut *tx, &row("calm", "ana")).await.unwrap();
    assert_eq!(ana.feeling, Field::Value("calm".to_string()));
    store::bulk_insert(&mut *tx, &[row("tense", "bo"), row("tense", "cy")])
        .await
        .unwrap();

    let tense = Feeling {
        feeling: "tense".to_string().into(),
        ..Feeling::default()
    };
    assert_eq!(store::count(&mut *tx, &tense).await.unwrap(), 2);

    let patch = Feeling {
        id: ana.id.clone(),
        feeling: "glad".to_string().into(),
        ..Feeling::default()
    };
    let updated = store::update_by_pk(&mut *tx, &patch).await.unwrap();
    assert_eq!(updated.feeling, Field::Value("glad".to_string()));

    let rename = Feeling {
        feeling: "glad".to_string().into(),
        name: "ana b".to_string().into(),
        ..Feeling::default()
    };
    let renamed = store::update_by_ak(&mut *tx, &rename, &["feeling"]).await.unwrap();
    assert_eq!(renamed.name, Field::Value("ana b".to_string()));

    tx.rollback().await.unwrap();
}
