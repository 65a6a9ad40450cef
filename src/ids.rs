/// Counter-plus-salt id source.
///
/// Ids look like `p-1a2b3c4d-7`. The salt separates sessions; the counter
/// never rewinds, so every call returns a fresh id.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    salt: u32,
    next: u64,
}

impl IdGenerator {
    pub fn new(salt: u32) -> Self {
        Self { salt, next: 1 }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{:08x}-{}", prefix, self.salt, self.next);
        self.next += 1;
        id
    }
}
