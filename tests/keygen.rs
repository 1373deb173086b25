//! End-to-end key-generation runs over an in-process message bus, plus
//! fault scenarios with tampered messages.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use curv::arithmetic::Converter;
use curv::elliptic::curves::secp256_k1::Secp256k1;
use curv::elliptic::curves::{Point, Scalar};
use curv::BigInt;

use gg18_keygen::messages::MessageBody;
use gg18_keygen::vss;
use gg18_keygen::{KeygenError, LocalParty, LocalSaveData, Message, Parameters, PartyId, SortedPartyIds};

type Party = LocalParty<Secp256k1>;
type SaveData = LocalSaveData<Secp256k1>;

const RECV_TIMEOUT: Duration = Duration::from_secs(600);

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_parties(
    keys: &[u32],
    threshold: u16,
) -> (Vec<Arc<Party>>, Receiver<Message>, Receiver<SaveData>) {
    let pids = SortedPartyIds::sort(
        keys.iter()
            .map(|k| PartyId::new(k.to_string(), format!("P[{}]", k), BigInt::from(*k)))
            .collect(),
    );
    let (out_tx, out_rx) = unbounded();
    let (end_tx, end_rx) = unbounded();
    let parties = (0..pids.len())
        .map(|i| {
            let params = Parameters::new(pids.clone(), i, threshold).unwrap();
            Arc::new(LocalParty::new(params, out_tx.clone(), end_tx.clone()))
        })
        .collect();
    (parties, out_rx, end_rx)
}

/// Runs every party on its own delivery thread until all of them have
/// emitted their save data.
fn run_to_completion(
    parties: &[Arc<Party>],
    out_rx: Receiver<Message>,
    end_rx: Receiver<SaveData>,
) -> Vec<SaveData> {
    let starters: Vec<_> = parties
        .iter()
        .cloned()
        .map(|p| thread::spawn(move || p.start().unwrap()))
        .collect();
    for s in starters {
        s.join().unwrap();
    }

    let mut inboxes: Vec<Sender<Message>> = Vec::with_capacity(parties.len());
    let mut workers = Vec::with_capacity(parties.len());
    for party in parties {
        let (tx, rx): (Sender<Message>, Receiver<Message>) = unbounded();
        let party = party.clone();
        workers.push(thread::spawn(move || {
            for msg in rx {
                party.update(msg).unwrap();
            }
        }));
        inboxes.push(tx);
    }

    let mut saves = Vec::with_capacity(parties.len());
    while saves.len() < parties.len() {
        crossbeam_channel::select! {
            recv(out_rx) -> msg => {
                let msg = msg.unwrap();
                match &msg.to {
                    None => {
                        for (j, inbox) in inboxes.iter().enumerate() {
                            if j != msg.from.index {
                                inbox.send(msg.clone()).unwrap();
                            }
                        }
                    }
                    Some(to) => inboxes[to.index].send(msg.clone()).unwrap(),
                }
            }
            recv(end_rx) -> save => saves.push(save.unwrap()),
        }
    }
    drop(inboxes);
    for w in workers {
        w.join().unwrap();
    }
    saves
}

/// Delivers messages single-threaded, applying `tamper` to each delivery,
/// until some party rejects one. Returns the detecting party's index and
/// its error.
fn run_until_error<F>(
    parties: &[Arc<Party>],
    out_rx: &Receiver<Message>,
    tamper: F,
) -> (usize, KeygenError)
where
    F: Fn(usize, &mut Message),
{
    for p in parties {
        p.start().unwrap();
    }
    loop {
        let msg = out_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        let recipients: Vec<usize> = match &msg.to {
            None => (0..parties.len()).filter(|j| *j != msg.from.index).collect(),
            Some(to) => vec![to.index],
        };
        for j in recipients {
            let mut delivered = msg.clone();
            tamper(j, &mut delivered);
            if let Err(e) = parties[j].update(delivered) {
                return (j, e);
            }
        }
    }
}

/// Lagrange-reconstructs the private key from `count` of the emitted
/// shares.
fn reconstruct_secret(saves: &[SaveData], threshold: u16, count: usize) -> Scalar<Secp256k1> {
    let shares: Vec<vss::Share<Secp256k1>> = saves
        .iter()
        .take(count)
        .map(|save| vss::Share {
            threshold,
            id: Scalar::from_bigint(&save.share_id),
            value: save.xi.clone(),
        })
        .collect();
    vss::reconstruct(&shares).unwrap()
}

fn sign(x: &Scalar<Secp256k1>, digest: &[u8]) -> (Scalar<Secp256k1>, Scalar<Secp256k1>) {
    let z = Scalar::<Secp256k1>::from_bigint(&BigInt::from_bytes(digest));
    loop {
        let k = Scalar::<Secp256k1>::random();
        let big_r = Point::generator() * &k;
        let r = Scalar::<Secp256k1>::from_bigint(&big_r.x_coord().unwrap());
        if r.is_zero() {
            continue;
        }
        let k_inv = k.invert().unwrap();
        let s = &k_inv * &(&z + &(&r * x));
        if s.is_zero() {
            continue;
        }
        return (r, s);
    }
}

fn verify_signature(
    y: &Point<Secp256k1>,
    digest: &[u8],
    r: &Scalar<Secp256k1>,
    s: &Scalar<Secp256k1>,
) -> bool {
    if r.is_zero() || s.is_zero() {
        return false;
    }
    let z = Scalar::<Secp256k1>::from_bigint(&BigInt::from_bytes(digest));
    let s_inv = match s.invert() {
        Some(inv) => inv,
        None => return false,
    };
    let u1 = &z * &s_inv;
    let u2 = r * &s_inv;
    let point = &(Point::generator() * &u1) + &(y * &u2);
    match point.x_coord() {
        Some(x) => Scalar::<Secp256k1>::from_bigint(&x) == *r,
        None => false,
    }
}

#[test]
fn three_party_keygen() {
    setup();
    let threshold = 1;
    let (parties, out_rx, end_rx) = make_parties(&[1, 2, 3], threshold);
    let saves = run_to_completion(&parties, out_rx, end_rx);
    assert_eq!(saves.len(), 3);

    // every party agrees on the public view, bit for bit
    for save in &saves[1..] {
        assert_eq!(save.ecdsa_pub, saves[0].ecdsa_pub);
        assert_eq!(save.big_xj, saves[0].big_xj);
        assert_eq!(save.ks, saves[0].ks);
    }

    // each party's public share matches its secret share
    for save in &saves {
        let j = save
            .ks
            .iter()
            .position(|k| k == &save.share_id)
            .unwrap();
        assert_eq!(save.big_xj[j], Point::generator() * &save.xi);
    }

    // any t+1 shares recover a secret consistent with the public key
    let x = reconstruct_secret(&saves, threshold, 2);
    assert_eq!(Point::generator() * &x, saves[0].ecdsa_pub);
    let x_all = reconstruct_secret(&saves, threshold, 3);
    assert_eq!(x_all, x);
}

#[test]
fn twenty_party_keygen_signs_and_verifies() {
    setup();
    let threshold = 10;
    let keys: Vec<u32> = (1..=20).collect();
    let (parties, out_rx, end_rx) = make_parties(&keys, threshold);
    let saves = run_to_completion(&parties, out_rx, end_rx);
    assert_eq!(saves.len(), 20);
    for save in &saves[1..] {
        assert_eq!(save.ecdsa_pub, saves[0].ecdsa_pub);
        assert_eq!(save.big_xj, saves[0].big_xj);
    }

    let x = reconstruct_secret(&saves, threshold, threshold as usize + 1);
    assert_eq!(Point::generator() * &x, saves[0].ecdsa_pub);

    let digest: Vec<u8> = (0u8..32).collect();
    let (r, s) = sign(&x, &digest);
    assert!(verify_signature(&saves[0].ecdsa_pub, &digest, &r, &s));
    let other_digest: Vec<u8> = (1u8..33).collect();
    assert!(!verify_signature(&saves[0].ecdsa_pub, &other_digest, &r, &s));
}

#[test]
fn tampered_de_commitment_is_detected() {
    setup();
    let (parties, out_rx, _end_rx) = make_parties(&[1, 2, 3], 1);
    // party index 1 receives a de-commitment from index 2 that does not
    // open index 2's earlier commitment
    let (detector, err) = run_until_error(&parties, &out_rx, |to, msg| {
        if to == 1 && msg.from.index == 2 {
            if let MessageBody::Round2Decommit(d) = &mut msg.body {
                d.de_commitment[1] = &d.de_commitment[1] + &BigInt::from(1);
            }
        }
    });
    assert_eq!(detector, 1);
    match err {
        KeygenError::CommitmentMismatch { culprit } => assert_eq!(culprit.index, 2),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn tampered_vss_share_is_detected() {
    setup();
    let (parties, out_rx, _end_rx) = make_parties(&[1, 2, 3], 1);
    // the share party index 0 sends to index 1 is incremented in flight
    let (detector, err) = run_until_error(&parties, &out_rx, |to, msg| {
        if to == 1 && msg.from.index == 0 {
            if let MessageBody::Round2Share(s) = &mut msg.body {
                s.share = &s.share + &BigInt::from(1);
            }
        }
    });
    assert_eq!(detector, 1);
    match err {
        KeygenError::VssVerifyFailed { culprit } => assert_eq!(culprit.index, 0),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn smooth_paillier_modulus_is_detected() {
    setup();
    let (parties, out_rx, _end_rx) = make_parties(&[1, 2, 3], 1);
    // every peer sees a Paillier modulus from index 0 with a factor of 7
    let (detector, err) = run_until_error(&parties, &out_rx, |_, msg| {
        if msg.from.index == 0 {
            if let MessageBody::Round1Commit(c) = &mut msg.body {
                c.paillier_n = &c.paillier_n * &BigInt::from(7);
            }
        }
    });
    assert_ne!(detector, 0);
    match err {
        KeygenError::PaillierProofFailed { culprit } => assert_eq!(culprit.index, 0),
        other => panic!("unexpected error: {:?}", other),
    }
}
