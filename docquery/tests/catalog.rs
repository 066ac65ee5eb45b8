use bson::{Bson, Document as BsonDocument, Uuid, doc};
use docquery::{
    books::Book,
    catalog,
    memory::InMemoryStore,
    prelude::*,
};

fn library() -> Vec<Book> {
    vec![
        Book::new("To Kill a Mockingbird").by("Harper Lee").genre("Fiction").published(1960).priced(12.99).in_stock(true),
        Book::new("1984").by("George Orwell").genre("Dystopian").published(1949).priced(10.99).in_stock(true),
        Book::new("The Great Gatsby").by("F. Scott Fitzgerald").genre("Fiction").published(1925).priced(9.99).in_stock(true),
        Book::new("Brave New World").by("Aldous Huxley").genre("Dystopian").published(1932).priced(11.5).in_stock(false),
        Book::new("The Hobbit").by("J.R.R. Tolkien").genre("Fantasy").published(1937).priced(14.99).in_stock(true),
        Book::new("The Catcher in the Rye").by("J.D. Salinger").genre("Fiction").published(1951).priced(8.99).in_stock(false),
        Book::new("Pride and Prejudice").by("Jane Austen").genre("Romance").published(1813).priced(7.99).in_stock(true),
        Book::new("The Lord of the Rings").by("J.R.R. Tolkien").genre("Fantasy").published(1954).priced(19.99).in_stock(true),
        Book::new("Animal Farm").by("George Orwell").genre("Political Satire").published(1945).priced(8.5).in_stock(false),
        Book::new("Homage to Catalonia").by("George Orwell").genre("Memoir").published(1938).priced(11.25).in_stock(true),
        Book::new("Moby Dick").by("Herman Melville").genre("Adventure").published(1851).priced(12.5).in_stock(false),
        Book::new("The Road").by("Cormac McCarthy").genre("Fiction").published(2006).priced(13.5).in_stock(true),
        Book::new("The Martian").by("Andy Weir").genre("Science Fiction").published(2011).priced(15.0).in_stock(true),
        Book::new("Project Hail Mary").by("Andy Weir").genre("Science Fiction").published(2021).priced(18.0).in_stock(false),
    ]
}

async fn seeded(books: Vec<Book>) -> DocumentStore<InMemoryStore> {
    let seed = books
        .iter()
        .map(|book| -> DocumentStoreResult<(Uuid, Bson)> { Ok((book.id.clone(), book.to_bson()?)) })
        .collect::<DocumentStoreResult<Vec<(Uuid, Bson)>>>()
        .unwrap();

    DocumentStore::new(
        InMemoryStore::builder()
            .with_documents(Book::collection_name(), seed)
            .build()
            .await
            .unwrap(),
    )
}

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().filter_map(|book| book.title.as_deref()).collect()
}

fn documents(values: Vec<Bson>) -> Vec<BsonDocument> {
    values
        .into_iter()
        .map(|value| value.as_document().cloned().unwrap())
        .collect()
}

#[tokio::test]
async fn find_all_returns_every_book_once_in_store_order() {
    let library = library();
    let store = seeded(library.clone()).await;

    let all = store.typed_collection::<Book>().find(Query::new()).await.unwrap();

    assert_eq!(all, library);
}

#[tokio::test]
async fn simple_filters() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();

    let fiction = books.find(catalog::fiction_books().unwrap()).await.unwrap();
    assert_eq!(
        titles(&fiction),
        vec!["To Kill a Mockingbird", "The Great Gatsby", "The Catcher in the Rye", "The Road"]
    );

    let recent = books.find(catalog::published_after_2000().unwrap()).await.unwrap();
    assert_eq!(titles(&recent), vec!["The Road", "The Martian", "Project Hail Mary"]);

    let orwell = books.find(catalog::by_george_orwell().unwrap()).await.unwrap();
    assert_eq!(titles(&orwell), vec!["1984", "Animal Farm", "Homage to Catalonia"]);

    let in_stock_recent = books.find(catalog::in_stock_after_2010().unwrap()).await.unwrap();
    assert_eq!(titles(&in_stock_recent), vec!["The Martian"]);
}

#[tokio::test]
async fn filtered_results_are_a_subset_satisfying_the_filter() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();
    let all = books.find(Query::new()).await.unwrap();

    let query = catalog::published_after_2000().unwrap();
    let recent = books.find(query).await.unwrap();

    assert!(recent.iter().all(|book| all.contains(book)));
    assert!(recent.iter().all(|book| book.published_year.is_some_and(|year| year > 2000)));
    assert_eq!(
        recent.len(),
        all.iter().filter(|book| book.published_year.is_some_and(|year| year > 2000)).count()
    );
}

#[tokio::test]
async fn gatsby_price_update_then_no_match() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();

    let (filter, update) = catalog::gatsby_price_update().unwrap();
    assert_eq!(books.update_one(filter, update).await.unwrap(), 1);

    let gatsby = books
        .find(Query::builder().filter(Filter::eq("title", "The Great Gatsby")).build())
        .await
        .unwrap();
    assert_eq!(gatsby.len(), 1);
    assert_eq!(gatsby[0].price, Some(13.99));

    let removed = books
        .update_one(Filter::eq("title", "The Great Gatsby"), Update::new().unset("title"))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let before = books.find(Query::new()).await.unwrap();
    let (filter, update) = catalog::gatsby_price_update().unwrap();
    assert_eq!(books.update_one(filter, update).await.unwrap(), 0);
    assert_eq!(books.find(Query::new()).await.unwrap(), before);
}

#[tokio::test]
async fn moby_dick_delete() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();

    assert_eq!(books.delete_one(catalog::moby_dick_delete().unwrap()).await.unwrap(), 1);
    assert_eq!(books.count(None).await.unwrap(), 13);
    assert_eq!(books.count(Some(catalog::moby_dick_delete().unwrap())).await.unwrap(), 0);
    assert_eq!(books.delete_one(catalog::moby_dick_delete().unwrap()).await.unwrap(), 0);
}

#[tokio::test]
async fn projection_keeps_title_author_and_price() {
    let store = seeded(library()).await;

    let projected = documents(
        store
            .collection("books")
            .find(catalog::title_author_price().unwrap())
            .await
            .unwrap(),
    );

    assert_eq!(projected.len(), 14);
    assert_eq!(
        projected[1],
        doc! { "title": "1984", "author": "George Orwell", "price": 10.99 }
    );
    assert!(projected.iter().all(|document| {
        document.keys().map(String::as_str).collect::<Vec<_>>() == ["title", "author", "price"]
    }));
}

#[tokio::test]
async fn price_sorts() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();

    let ascending = books.find(catalog::by_price_ascending().unwrap()).await.unwrap();
    let prices = ascending.iter().filter_map(|book| book.price).collect::<Vec<_>>();
    assert_eq!(prices.len(), 14);
    assert!(prices.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(ascending[0].title.as_deref(), Some("Pride and Prejudice"));

    let descending = books.find(catalog::by_price_descending().unwrap()).await.unwrap();
    assert_eq!(descending.iter().rev().cloned().collect::<Vec<_>>(), ascending);
    assert_eq!(descending[0].title.as_deref(), Some("The Lord of the Rings"));
}

#[tokio::test]
async fn sorting_is_stable() {
    let library = library();
    let store = seeded(library.clone()).await;

    let by_stock = store
        .typed_collection::<Book>()
        .find(Query::builder().sort("in_stock", SortDirection::Asc).build())
        .await
        .unwrap();

    let expected = library
        .iter()
        .filter(|book| book.in_stock == Some(false))
        .chain(library.iter().filter(|book| book.in_stock == Some(true)))
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(by_stock, expected);
}

#[tokio::test]
async fn first_and_second_page() {
    let library = library();
    let store = seeded(library.clone()).await;
    let books = store.typed_collection::<Book>();

    let first = books.find(catalog::first_page()).await.unwrap();
    let second = books.find(catalog::second_page()).await.unwrap();

    assert_eq!(first, library[..5].to_vec());
    assert_eq!(second, library[5..10].to_vec());
}

#[tokio::test]
async fn pages_partition_sorted_output() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();
    let sorted = books.find(catalog::by_price_ascending().unwrap()).await.unwrap();

    let mut collected = Vec::new();
    let mut params = PaginationParams::new(0, 4);
    loop {
        let page = books
            .find_page(catalog::by_price_ascending().unwrap(), params)
            .await
            .unwrap();
        assert_eq!(page.count, 14);
        collected.extend(page.items);

        match page.next_page {
            Some(next) => params = PaginationParams::new(next, 4),
            None => break,
        }
    }

    assert_eq!(params.page, 3);
    assert_eq!(collected, sorted);
}

#[tokio::test]
async fn zero_sized_page_is_empty() {
    let store = seeded(library()).await;
    let books = store.typed_collection::<Book>();

    let page = books
        .find_page(catalog::by_price_ascending().unwrap(), PaginationParams::new(2, 0))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.count, 14);
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(1));
}

#[tokio::test]
async fn average_price_by_genre() {
    let store = seeded(library()).await;

    let groups = documents(
        store
            .collection("books")
            .aggregate(catalog::average_price_by_genre().unwrap())
            .await
            .unwrap(),
    );

    let genres = groups
        .iter()
        .map(|group| group.get_str("_id").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        genres,
        vec![
            "Fiction",
            "Dystopian",
            "Fantasy",
            "Romance",
            "Political Satire",
            "Memoir",
            "Adventure",
            "Science Fiction",
        ]
    );

    let dystopian = groups[1].get_f64("averagePrice").unwrap();
    assert!((dystopian - (10.99 + 11.5) / 2.0).abs() < 1e-9);
    assert_eq!(groups[3].get_f64("averagePrice").unwrap(), 7.99);
}

#[tokio::test]
async fn equal_averages_for_two_genres() {
    let store = seeded(vec![
        Book::new("Book A").genre("Fiction").priced(10.0),
        Book::new("Book B").genre("Fiction").priced(20.0),
        Book::new("Book C").genre("Sci-Fi").priced(15.0),
    ])
    .await;

    let groups = documents(
        store
            .collection("books")
            .aggregate(catalog::average_price_by_genre().unwrap())
            .await
            .unwrap(),
    );

    assert_eq!(
        groups,
        vec![
            doc! { "_id": "Fiction", "averagePrice": 15.0 },
            doc! { "_id": "Sci-Fi", "averagePrice": 15.0 },
        ]
    );
}

#[tokio::test]
async fn top_author() {
    let store = seeded(library()).await;

    let top = documents(
        store
            .collection("books")
            .aggregate(catalog::top_author().unwrap())
            .await
            .unwrap(),
    );

    assert_eq!(top, vec![doc! { "_id": "George Orwell", "bookCount": 3 }]);
}

#[tokio::test]
async fn counts_match_group_sizes() {
    let store = seeded(library()).await;
    let books = store.collection("books");

    let counts = documents(
        books
            .aggregate(Pipeline::parse(&[doc! { "$group": { "_id": "$genre", "n": { "$sum": 1 } } }]).unwrap())
            .await
            .unwrap(),
    );

    for group in counts {
        let genre = group.get_str("_id").unwrap();
        let expected = books.count(Some(Filter::eq("genre", genre))).await.unwrap();
        assert_eq!(group.get_i32("n").unwrap() as usize, expected);
    }
}

#[tokio::test]
async fn books_per_decade() {
    let store = seeded(library()).await;

    let decades = documents(
        store
            .collection("books")
            .aggregate(catalog::books_per_decade().unwrap())
            .await
            .unwrap(),
    );

    assert_eq!(
        decades,
        vec![
            doc! { "_id": "1810s", "count": 1 },
            doc! { "_id": "1850s", "count": 1 },
            doc! { "_id": "1920s", "count": 1 },
            doc! { "_id": "1930s", "count": 3 },
            doc! { "_id": "1940s", "count": 2 },
            doc! { "_id": "1950s", "count": 2 },
            doc! { "_id": "1960s", "count": 1 },
            doc! { "_id": "2000s", "count": 1 },
            doc! { "_id": "2010s", "count": 1 },
            doc! { "_id": "2020s", "count": 1 },
        ]
    );
}

#[tokio::test]
async fn indexes_never_change_results() {
    let store = seeded(library()).await;
    let books = store.collection("books");

    let queries = || {
        vec![
            catalog::fiction_books().unwrap(),
            catalog::published_after_2000().unwrap(),
            catalog::by_george_orwell().unwrap(),
            catalog::in_stock_after_2010().unwrap(),
            catalog::title_author_price().unwrap(),
            catalog::by_price_ascending().unwrap(),
            catalog::second_page(),
            catalog::hobbit_by_title().unwrap(),
        ]
    };

    let mut before = Vec::new();
    for query in queries() {
        before.push(books.find(query).await.unwrap());
    }

    assert_eq!(books.create_index(catalog::title_index().unwrap()).await.unwrap(), "title_1");
    assert_eq!(
        books.create_index(catalog::author_year_index().unwrap()).await.unwrap(),
        "author_1_published_year_1"
    );
    assert_eq!(books.list_indexes().await.unwrap().len(), 2);

    let mut after = Vec::new();
    for query in queries() {
        after.push(books.find(query).await.unwrap());
    }

    assert_eq!(before, after);
}

#[tokio::test]
async fn explain_before_and_after_title_index() {
    let store = seeded(library()).await;
    let books = store.collection("books");

    let before = books.explain(catalog::hobbit_by_title().unwrap()).await.unwrap();
    assert_eq!(before.plan, QueryPlan::CollectionScan);
    assert_eq!(before.index_name, None);
    assert_eq!(before.documents_examined, 14);
    assert_eq!(before.documents_returned, 1);

    books.create_index(catalog::author_year_index().unwrap()).await.unwrap();
    let compound_only = books.explain(catalog::hobbit_by_title().unwrap()).await.unwrap();
    assert_eq!(compound_only.plan, QueryPlan::CollectionScan);

    books.create_index(catalog::title_index().unwrap()).await.unwrap();
    let after = books.explain(catalog::hobbit_by_title().unwrap()).await.unwrap();
    assert_eq!(after.plan, QueryPlan::IndexScan);
    assert_eq!(after.index_name.as_deref(), Some("title_1"));
    assert_eq!(after.documents_returned, 1);

    let by_author = books.explain(catalog::by_george_orwell().unwrap()).await.unwrap();
    assert_eq!(by_author.index_name.as_deref(), Some("author_1_published_year_1"));
    assert_eq!(by_author.documents_returned, 3);
}

#[tokio::test]
async fn malformed_input_is_rejected_before_evaluation() {
    let store = seeded(library()).await;
    let books = store.collection("books");

    assert!(matches!(
        Expr::parse(&doc! { "price": { "$near": 10 } }),
        Err(DocumentStoreError::InvalidQuery(_))
    ));
    assert!(matches!(
        Update::parse(&doc! { "price": 13.99 }),
        Err(DocumentStoreError::InvalidUpdate(_))
    ));

    let err = books
        .aggregate(
            Pipeline::parse(&[
                doc! { "$match": { "in_stock": true } },
                doc! { "$project": { "label": { "$concat": [ "$title", "$price" ] } } },
            ])
            .unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Pipeline { index: 1, .. }));
    assert_eq!(books.count(None).await.unwrap(), 14);
}
