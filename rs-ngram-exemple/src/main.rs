use rs_ngram_core::io::{list_files, normalize_folder, read_file};
use rs_ngram_core::{Error, Model, ModelConfig, PunctuationTokenizer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Every .txt file of the "data" directory is a corpus, one text per line
    let data = normalize_folder("./data");

    // Open (or create) a trigram model in "data/brain".
    // Its settings are stored in "data/brain/model.toml" on first run.
    // The punctuation-preserving tokenizer keeps spaces and punctuation
    // as tokens, so replies keep the spacing of the texts they came from.
    let mut model = Model::open_with(data.join("brain"), ModelConfig::with_order(3), Box::new(PunctuationTokenizer))?;

    // Training is appended to "data/brain/ngram.log" and replayed on the
    // next run, so only learn the corpora on a fresh model
    if model.registry().len() <= 2 {
        for file in list_files(&data, "txt")? {
            let learned = model.train_all(read_file(data.join(&file))?)?;
            println!("Learned {} lines from {}", learned, file);
        }
    }

    // Counts of any order up to 3
    println!("Count of 'the': {}", model.get_ngram_count(&["the"])?);
    println!("Entropy of 'the cat': {}", model.entropy("the cat")?);

    // Asking for a 4-gram on a trigram model is an error
    match model.get_ngram_count(&["a", "b", "c", "d"]) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{}", e),
    }

    // Generate 10 replies; each one gets the configured time budget
    for i in 0..10 {
        match model.reply("the") {
            Ok(reply) => println!("Reply {}: {}", i + 1, reply),
            Err(Error::NoPivot) => {
                println!("Nothing learned about 'the' yet, no reply");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Freeze the counts to data/brain/1grams .. 3grams
    let records = model.freeze_counts()?;
    println!("Frozen records per order: {:?}", records);

    Ok(())
}
