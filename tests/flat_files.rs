use std::{fs, sync::Arc};

use movieverse::{
    Catalog, CatalogError, FilterConfig, FlatFileSource, GenreMatch, QueryFacade,
    language::{ScanOptions, UNKNOWN_LANGUAGE},
};
use tempfile::TempDir;

const BASICS: &str = "\
tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres
tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short
tt0082971\tmovie\tRaiders of the Lost Ark\tRaiders of the Lost Ark\t0\t1981\t\\N\t115\tAction,Adventure
tt0095016\tmovie\tDie Hard\tDie Hard\t0\t1988\t\\N\t132\tAction,Thriller
tt0087843\tmovie\tOnce Upon a Time in America\tOnce Upon a Time in America\t0\t1984\t\\N\t229\tCrime,Drama
tt0120737\tmovie\tThe Fellowship of the Ring\tThe Fellowship of the Ring\t0\t2001\t\\N\t178\tAction,Adventure,Drama
tt0364569\tmovie\tOldboy\tOldeuboi\t0\t2003\t\\N\t120\tAction,Drama,Mystery
tt7777777\tmovie\tLost Reel\tLost Reel\t0\t\\N\t\\N\t\\N\tDrama
tt8888888\tmovie\tbroken row
tt9999999\tmovie\tNo Ratings Here\tNo Ratings Here\t0\t2020\t\\N\t90\tAction
";

const RATINGS: &str = "\
tconst\taverageRating\tnumVotes
tt0000001\t5.7\t2100
tt0082971\t8.4\t1000000
tt0095016\t8.2\t900000
tt0087843\t8.3\t360000
tt0120737\t8.9\t2000000
tt0364569\t8.3\t620000
tt7777777\t7.0\t40
";

const AKAS: &str = "\
titleId\tordering\ttitle\tregion\tlanguage\ttypes\tattributes\tisOriginalTitle
tt0082971\t1\tRaiders\tUS\ten\t\\N\t\\N\t0
tt0082971\t2\tLes Aventuriers\tFR\tfr\t\\N\t\\N\t0
tt0082971\t3\tRaiders\tGB\ten\t\\N\t\\N\t0
tt0364569\t1\tOldeuboi\tKR\tko\toriginal\t\\N\t1
tt0364569\t2\tOldboy\tUS\ten\t\\N\t\\N\t0
tt0364569\t3\tOldboy\tGB\ten\t\\N\t\\N\t0
tt0120737\t1\tLa Comunidad\tES\tes\t\\N\t\\N\t0
tt0120737\t2\tLa Comunidad\tMX\tes\t\\N\t\\N\t0
tt0120737\t3\tLa Comunidad\tAR\tes\t\\N\t\\N\t0
tt0120737\t4\tDie Gefährten\tDE\tde\t\\N\t\\N\t0
tt0087843\t1\tC'era una volta\tIT\tit\t\\N\t\\N\tbad
";

fn dataset(with_akas: bool) -> (TempDir, FlatFileSource) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("title.basics.tsv"), BASICS).unwrap();
    fs::write(dir.path().join("title.ratings.tsv"), RATINGS).unwrap();
    if with_akas {
        fs::write(dir.path().join("title.akas.tsv"), AKAS).unwrap();
    }
    let source = FlatFileSource::in_dir(dir.path());
    (dir, source)
}

fn facade(with_akas: bool) -> (TempDir, QueryFacade) {
    let (dir, source) = dataset(with_akas);
    let catalog = Catalog::load(Arc::new(source), ScanOptions { chunk_size: 3, parallel_chunks: 2 }).unwrap();
    (dir, QueryFacade::new(Arc::new(catalog)))
}

#[test]
fn load_joins_movies_with_ratings_only() {
    let (_dir, f) = facade(true);
    let stats = f.stats();

    assert_eq!(stats.titles.rows, 9);
    assert_eq!(stats.titles.filtered, 1);
    assert_eq!(stats.titles.skipped, 1);
    assert_eq!(stats.entries, 6);

    let all = f.with_filters(&FilterConfig::default(), 100);
    let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
    assert!(!ids.contains(&"tt0000001"));
    assert!(!ids.contains(&"tt9999999"));
    assert_eq!(ids.len(), 6);
}

#[test]
fn missing_base_table_is_fatal() {
    let dir = TempDir::new().unwrap();
    let source = FlatFileSource::in_dir(dir.path());
    let err = Catalog::load(Arc::new(source), ScanOptions::default()).err().unwrap();
    assert!(matches!(err, CatalogError::DatasetNotFound { .. }));
}

#[test]
fn language_policy_over_the_file() {
    let (_dir, f) = facade(true);

    let korean = f.by_language("ko", 10);
    assert_eq!(korean.len(), 1);
    assert_eq!(korean[0].title, "Oldboy");

    let spanish = f.by_language("es", 10);
    assert_eq!(spanish[0].id, "tt0120737");

    let english: Vec<_> = f.by_language("en", 10).into_iter().map(|m| m.id).collect();
    assert_eq!(english, vec!["tt0082971"]);

    let codes: Vec<_> = f.available_languages().into_iter().map(|l| l.code).collect();
    assert_eq!(codes, vec!["en", "es", "ko"]);
}

#[test]
fn missing_language_file_degrades_to_unknown() {
    let (_dir, f) = facade(false);
    assert!(f.by_language("en", 10).is_empty());
    assert!(f.available_languages().is_empty());

    let hits = f.search("die hard", 1, false);
    assert_eq!(hits[0].language.as_deref(), Some(UNKNOWN_LANGUAGE));
}

#[test]
fn combined_filters() {
    let (_dir, f) = facade(true);
    let cfg = FilterConfig {
        genres: Some(vec!["drama".into(), "ACTION".into()]),
        genre_match: GenreMatch::All,
        min_rating: Some(8.0),
        min_votes: Some(500_000),
        min_year: Some(1980),
        max_year: Some(2005),
        min_runtime: Some(90),
        max_runtime: Some(180),
        language: None,
    };
    let ids: Vec<_> = f.with_filters(&cfg, 10).into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["tt0120737", "tt0364569"]);
}

#[test]
fn reload_picks_up_changed_files() {
    let (dir, source) = dataset(true);
    let catalog = Arc::new(Catalog::load(Arc::new(source), ScanOptions::default()).unwrap());
    let f = QueryFacade::new(catalog.clone());
    let before = catalog.snapshot();

    fs::write(
        dir.path().join("title.ratings.tsv"),
        "tconst\taverageRating\tnumVotes\ntt0095016\t8.2\t900001\n",
    )
    .unwrap();
    assert!(catalog.reload().unwrap());

    assert_eq!(before.entries().len(), 6);
    assert_eq!(f.most_popular(10, None).len(), 1);
    assert_eq!(f.most_popular(10, None)[0].num_votes, 900_001);
}
