/// Sample `users` table used when no seed file is supplied.
pub const BUILTIN_SEED: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        age INTEGER
    );

    INSERT INTO users (name, email, age) VALUES ('Ada Lovelace', 'ada@example.com', 36);
    INSERT INTO users (name, email, age) VALUES ('Alan Turing', 'alan@example.com', 41);
    INSERT INTO users (name, email, age) VALUES ('Grace Hopper', 'grace@example.com', 85);
    INSERT INTO users (name, email, age) VALUES ('Linus Torvalds', 'linus@example.com', 54);
    INSERT INTO users (name, email, age) VALUES ('Margaret Hamilton', 'margaret@example.com', 88);
";
