mod gating;
mod slow_storage;
