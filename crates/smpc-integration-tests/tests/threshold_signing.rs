//! Integration test: threshold ECDSA signing across loopback nodes.
//!
//! 1. Deal a key into `n` shares and start one node per share
//! 2. Send SIGN to one node with a roster of at least `2k - 1` members
//! 3. Check the DER response against the dealt public key
//!
//! Also covers fresh nonces per run, rosters that include the root's own
//! entry, and concurrent sessions on overlapping members.

mod common;

use common::Cluster;

#[tokio::test]
async fn signature_verifies_against_dealt_key() {
    let cluster = Cluster::start(2, 3).await;
    let message = b"transfer 10 units to alice";

    let der = cluster.sign(0, &[1, 2], message).await.expect("signature");
    cluster.verify(message, &der);

    cluster.stop();
}

#[tokio::test]
async fn roster_may_list_the_root_itself() {
    let cluster = Cluster::start(2, 4).await;
    let message = b"root listed in its own roster";

    let der = cluster
        .sign(2, &[0, 2, 3], message)
        .await
        .expect("signature");
    cluster.verify(message, &der);

    cluster.stop();
}

#[tokio::test]
async fn any_qualifying_subset_can_sign() {
    let cluster = Cluster::start(3, 7).await;
    let message = b"subset signing";

    // Two disjoint-ish rosters of 2k - 1 = 5 members each.
    for (root, members) in [(0, vec![1, 2, 3, 4]), (6, vec![5, 4, 3, 1])] {
        let der = cluster
            .sign(root, &members, message)
            .await
            .expect("signature");
        cluster.verify(message, &der);
    }

    cluster.stop();
}

#[tokio::test]
async fn nonce_is_fresh_per_session() {
    let cluster = Cluster::start(2, 3).await;
    let message = b"same message twice";

    let first = cluster.sign(0, &[1, 2], message).await.expect("first");
    let second = cluster.sign(1, &[0, 2], message).await.expect("second");
    let first = cluster.verify(message, &first);
    let second = cluster.verify(message, &second);
    assert_ne!(
        first.r().to_bytes(),
        second.r().to_bytes(),
        "r must differ between sessions"
    );

    cluster.stop();
}

#[tokio::test]
async fn large_message_is_forwarded_in_chunks() {
    let cluster = Cluster::start(2, 3).await;
    let message: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let der = cluster.sign(0, &[1, 2], &message).await.expect("signature");
    cluster.verify(&message, &der);

    cluster.stop();
}

#[tokio::test]
async fn concurrent_sessions_on_shared_members() {
    let cluster = Cluster::start(2, 4).await;
    let (a, b) = tokio::join!(
        cluster.sign(0, &[1, 2], b"first session"),
        cluster.sign(3, &[1, 2], b"second session"),
    );
    cluster.verify(b"first session", &a.expect("first"));
    cluster.verify(b"second session", &b.expect("second"));

    cluster.stop();
}

#[tokio::test]
#[ignore]
async fn full_roster_of_sixteen() {
    let cluster = Cluster::start(5, 16).await;
    let message = b"sixteen-node roster";
    let members: Vec<usize> = (1..16).collect();

    let der = cluster.sign(0, &members, message).await.expect("signature");
    cluster.verify(message, &der);

    cluster.stop();
}
