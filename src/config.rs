use std::{env, fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::{
    account::Account,
    error::{Error, Result},
};

#[derive(Clone, Deserialize)]
pub struct ClassCredentials {
    pub class_name: String,
    pub username: String,
    pub password: String,
}

/// Server location plus one credential pair per enrolled class.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub url: String,
    pub classes: Vec<ClassCredentials>,
}

impl Config {
    /// Reads `url`, `classes` (comma separated) and `username{i}`/`password{i}`
    /// for the i-th class. A `.env` file in the working directory is loaded first.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(e.into());
        }

        let url = env::var("url").map_err(|_| anyhow::anyhow!("missing `url` in environment"))?;
        let names = env::var("classes").map_err(|_| anyhow::anyhow!("missing `classes` in environment"))?;

        let classes = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .enumerate()
            .map(|(idx, class_name)| {
                let (Ok(username), Ok(password)) = (
                    env::var(format!("username{idx}")),
                    env::var(format!("password{idx}")),
                ) else {
                    anyhow::bail!("missing login credentials for {class_name} (username{idx}/password{idx})");
                };
                Ok(ClassCredentials {
                    class_name: class_name.to_owned(),
                    username,
                    password,
                })
            })
            .collect::<anyhow::Result<_>>()?;

        Ok(Self { url, classes })
    }

    pub fn from_json(file: &Path) -> anyhow::Result<Self> {
        let file = File::open(file)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(Into::into)
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        if self.classes.is_empty() {
            return Err(Error::InvalidAccount {
                account: "<none>".into(),
                reason: "no classes configured",
            });
        }
        self.classes
            .iter()
            .map(|c| Account::new(&c.class_name, &c.username, &c.password, &self.url))
            .collect()
    }
}
